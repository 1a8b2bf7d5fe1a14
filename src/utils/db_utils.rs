use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::{
    MySql, MySqlPool,
    mysql::MySqlArguments,
    query::{Query, QueryAs, QueryScalar},
};

use crate::error::AppError;

/// Typed binding for dynamically built WHERE clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

impl FilterValue {
    pub fn bind<'q>(
        &'q self,
        query: Query<'q, MySql, MySqlArguments>,
    ) -> Query<'q, MySql, MySqlArguments> {
        match self {
            FilterValue::U64(v) => query.bind(*v),
            FilterValue::Str(s) => query.bind(s.as_str()),
            FilterValue::Date(d) => query.bind(*d),
        }
    }

    pub fn bind_as<'q, O>(
        &'q self,
        query: QueryAs<'q, MySql, O, MySqlArguments>,
    ) -> QueryAs<'q, MySql, O, MySqlArguments> {
        match self {
            FilterValue::U64(v) => query.bind(*v),
            FilterValue::Str(s) => query.bind(s.as_str()),
            FilterValue::Date(d) => query.bind(*d),
        }
    }

    pub fn bind_scalar<'q, O>(
        &'q self,
        query: QueryScalar<'q, MySql, O, MySqlArguments>,
    ) -> QueryScalar<'q, MySql, O, MySqlArguments> {
        match self {
            FilterValue::U64(v) => query.bind(*v),
            FilterValue::Str(s) => query.bind(s.as_str()),
            FilterValue::Date(d) => query.bind(*d),
        }
    }
}

/// Joins conditions into a WHERE clause, empty when there are none.
pub fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE {table} SET ... WHERE {id_column} = ?` from a JSON object.
///
/// Only keys listed in `allowed` are accepted; anything else is a bad
/// request so column names never come from the client unchecked.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Payload must be a JSON object".to_string()))?;

    if obj.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".to_string()));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::BadRequest(format!("Field '{unknown}' cannot be updated")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    values.push(SqlValue::DateTime(dt));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => {
                return Err(AppError::BadRequest("Unsupported JSON value type".to_string()));
            }
        }
    }

    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// Runs the update and returns the number of affected rows.
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Page number, page size and row offset from optional query values.
/// The offset is widened so any `u32` page is representable.
pub fn page_bounds(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
    (page, per_page, u64::from(page - 1) * u64::from(per_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_set_clause_for_allowed_fields() {
        let update = build_update_sql(
            "customers",
            &json!({"name": "Ana"}),
            &["name", "phone"],
            "id",
            5,
        )
        .unwrap();
        assert_eq!(update.sql, "UPDATE customers SET name = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![SqlValue::String("Ana".into()), SqlValue::U64(5)]
        );
    }

    #[test]
    fn rejects_unknown_columns() {
        let err = build_update_sql(
            "customers",
            &json!({"owner_id": 1}),
            &["name"],
            "id",
            5,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("t", &json!({}), &["a"], "id", 1).is_err());
        assert!(build_update_sql("t", &json!([1]), &["a"], "id", 1).is_err());
    }

    #[test]
    fn dates_are_parsed() {
        let update =
            build_update_sql("workers", &json!({"hire_date": "2025-02-03"}), &["hire_date"], "id", 1)
                .unwrap();
        assert_eq!(
            update.values[0],
            SqlValue::Date(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap())
        );
    }

    #[test]
    fn page_bounds_clamp() {
        assert_eq!(page_bounds(None, None, 20), (1, 20, 0));
        assert_eq!(page_bounds(Some(3), Some(500), 20), (3, 100, 200));
        assert_eq!(page_bounds(Some(0), Some(0), 20), (1, 1, 0));
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let (page, per_page, offset) = page_bounds(Some(u32::MAX), Some(100), 20);
        assert_eq!((page, per_page), (u32::MAX, 100));
        assert_eq!(offset, (u64::from(u32::MAX) - 1) * 100);
        assert!(i64::try_from(offset).is_ok());
    }
}
