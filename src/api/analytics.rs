use crate::{
    api::inventory::ITEM_COLUMNS,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        expense::Expense,
        inventory::InventoryItem,
        service::{Service, ServiceStatus},
    },
    repository::inventory::SERVICE_COLUMNS,
    utils::db_utils::{FilterValue, where_clause},
};
use actix_web::{HttpResponse, http::header, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AnalyticsQuery {
    /// Inclusive start date
    pub from: Option<NaiveDate>,
    /// Inclusive end date
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct TopService {
    pub service_name: String,
    pub count: i64,
    pub revenue: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub revenue: f64,
    pub expenses: f64,
    pub net_profit: f64,
    pub completed_services: i64,
    pub open_services: i64,
    pub worker_earnings: f64,
    pub customers: i64,
    pub workers: i64,
    pub low_stock_items: i64,
    pub inventory_value: f64,
    pub top_services: Vec<TopService>,
}

#[derive(Serialize, ToSchema)]
pub struct AnalyticsExport {
    pub generated_at: DateTime<Utc>,
    pub summary: AnalyticsSummary,
    pub services: Vec<Service>,
    pub expenses: Vec<Expense>,
    pub inventory: Vec<InventoryItem>,
}

fn guard(auth: &AuthUser) -> AppResult<()> {
    auth.require_capability("view_analytics")?;
    auth.require_feature("analytics")
}

fn validate_range(query: &AnalyticsQuery) -> AppResult<()> {
    match (query.from, query.to) {
        (Some(from), Some(to)) if from > to => Err(AppError::BadRequest(
            "'from' must not be after 'to'".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Date-range conditions on `column`, plus any fixed conditions.
fn range_filter(
    column: &str,
    query: &AnalyticsQuery,
    fixed: &[&str],
) -> (String, Vec<FilterValue>) {
    let mut conditions: Vec<String> = fixed.iter().map(|c| c.to_string()).collect();
    let mut bindings = Vec::new();

    if let Some(from) = query.from {
        conditions.push(format!("DATE({column}) >= ?"));
        bindings.push(FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        conditions.push(format!("DATE({column}) <= ?"));
        bindings.push(FilterValue::Date(to));
    }

    let refs: Vec<&str> = conditions.iter().map(String::as_str).collect();
    (where_clause(&refs), bindings)
}

async fn scalar_f64(pool: &MySqlPool, sql: &str, bindings: &[FilterValue]) -> AppResult<f64> {
    debug!(sql, "Analytics aggregate");
    let mut query = sqlx::query_scalar::<_, f64>(sql);
    for b in bindings {
        query = b.bind_scalar(query);
    }
    Ok(query.fetch_one(pool).await?)
}

async fn scalar_i64(pool: &MySqlPool, sql: &str, bindings: &[FilterValue]) -> AppResult<i64> {
    debug!(sql, "Analytics count");
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    for b in bindings {
        query = b.bind_scalar(query);
    }
    Ok(query.fetch_one(pool).await?)
}

pub async fn load_summary(pool: &MySqlPool, query: &AnalyticsQuery) -> AppResult<AnalyticsSummary> {
    let completed = format!("status = '{}'", ServiceStatus::Completed.as_ref());
    let open = format!(
        "status IN ('{}', '{}')",
        ServiceStatus::Pending.as_ref(),
        ServiceStatus::InProgress.as_ref()
    );

    let (completed_where, completed_bind) = range_filter("scheduled_at", query, &[completed.as_str()]);
    let revenue = scalar_f64(
        pool,
        &format!("SELECT CAST(COALESCE(SUM(price), 0) AS DOUBLE) FROM services {completed_where}"),
        &completed_bind,
    )
    .await?;
    let completed_services = scalar_i64(
        pool,
        &format!("SELECT COUNT(*) FROM services {completed_where}"),
        &completed_bind,
    )
    .await?;

    let (open_where, open_bind) = range_filter("scheduled_at", query, &[open.as_str()]);
    let open_services = scalar_i64(
        pool,
        &format!("SELECT COUNT(*) FROM services {open_where}"),
        &open_bind,
    )
    .await?;

    let (expense_where, expense_bind) = range_filter("expense_date", query, &[]);
    let expenses = scalar_f64(
        pool,
        &format!("SELECT CAST(COALESCE(SUM(amount), 0) AS DOUBLE) FROM expenses {expense_where}"),
        &expense_bind,
    )
    .await?;

    let (earning_where, earning_bind) = range_filter("created_at", query, &[]);
    let worker_earnings = scalar_f64(
        pool,
        &format!(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS DOUBLE) FROM worker_earnings {earning_where}"
        ),
        &earning_bind,
    )
    .await?;

    let customers = scalar_i64(pool, "SELECT COUNT(*) FROM customers", &[]).await?;
    let workers = scalar_i64(pool, "SELECT COUNT(*) FROM workers", &[]).await?;
    let low_stock_items = scalar_i64(
        pool,
        "SELECT COUNT(*) FROM inventory_items WHERE current_stock <= min_threshold",
        &[],
    )
    .await?;
    let inventory_value = scalar_f64(
        pool,
        "SELECT CAST(COALESCE(SUM(current_stock * unit_price), 0) AS DOUBLE) FROM inventory_items",
        &[],
    )
    .await?;

    let top_sql = format!(
        r#"
        SELECT service_name, COUNT(*) AS count, CAST(COALESCE(SUM(price), 0) AS DOUBLE) AS revenue
        FROM services {completed_where}
        GROUP BY service_name
        ORDER BY revenue DESC
        LIMIT 5
        "#
    );
    let mut top_query = sqlx::query_as::<_, TopService>(&top_sql);
    for b in &completed_bind {
        top_query = b.bind_as(top_query);
    }
    let top_services = top_query.fetch_all(pool).await?;

    Ok(AnalyticsSummary {
        from: query.from,
        to: query.to,
        revenue,
        expenses,
        net_profit: revenue - expenses - worker_earnings,
        completed_services,
        open_services,
        worker_earnings,
        customers,
        workers,
        low_stock_items,
        inventory_value,
        top_services,
    })
}

pub fn export_filename(date: NaiveDate) -> String {
    format!("salon-export-{}.json", date.format("%Y-%m-%d"))
}

#[utoipa::path(
    get,
    path = "/api/analytics/summary",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Business totals for the range", body = AnalyticsSummary),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Admin only")
    ),
    tag = "Analytics",
    security(("bearer_auth" = []))
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AnalyticsQuery>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    validate_range(&query)?;
    let summary = load_summary(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Full data dump for the range as a downloadable JSON file.
#[utoipa::path(
    get,
    path = "/api/analytics/export",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "JSON attachment", body = AnalyticsExport),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Admin only")
    ),
    tag = "Analytics",
    security(("bearer_auth" = []))
)]
pub async fn export(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AnalyticsQuery>,
) -> AppResult<HttpResponse> {
    auth.require_feature("export")?;
    guard(&auth)?;
    validate_range(&query)?;

    let summary = load_summary(pool.get_ref(), &query).await?;

    let (service_where, service_bind) = range_filter("scheduled_at", &query, &[]);
    let service_sql =
        format!("SELECT {SERVICE_COLUMNS} FROM services {service_where} ORDER BY scheduled_at");
    let mut service_query = sqlx::query_as::<_, Service>(&service_sql);
    for b in &service_bind {
        service_query = b.bind_as(service_query);
    }
    let services = service_query.fetch_all(pool.get_ref()).await?;

    let (expense_where, expense_bind) = range_filter("expense_date", &query, &[]);
    let expense_sql = format!(
        "SELECT id, category, description, amount, expense_date, owner_id, created_at \
         FROM expenses {expense_where} ORDER BY expense_date"
    );
    let mut expense_query = sqlx::query_as::<_, Expense>(&expense_sql);
    for b in &expense_bind {
        expense_query = b.bind_as(expense_query);
    }
    let expenses = expense_query.fetch_all(pool.get_ref()).await?;

    let inventory_sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items ORDER BY name");
    let inventory = sqlx::query_as::<_, InventoryItem>(&inventory_sql)
        .fetch_all(pool.get_ref())
        .await?;

    let now = Utc::now();
    info!(
        admin_id = auth.user_id,
        services = services.len(),
        expenses = expenses.len(),
        "Analytics exported"
    );

    Ok(HttpResponse::Ok()
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export_filename(now.date_naive())),
        ))
        .json(AnalyticsExport {
            generated_at: now,
            summary,
            services,
            expenses,
            inventory,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_filter_adds_dates_after_fixed_conditions() {
        let query = AnalyticsQuery {
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            to: None,
        };
        let (sql, bindings) = range_filter("expense_date", &query, &["owner_id = 1"]);
        assert_eq!(sql, "WHERE owner_id = 1 AND DATE(expense_date) >= ?");
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn no_range_no_where() {
        let (sql, bindings) = range_filter("created_at", &AnalyticsQuery::default(), &[]);
        assert!(sql.is_empty());
        assert!(bindings.is_empty());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let query = AnalyticsQuery {
            from: NaiveDate::from_ymd_opt(2025, 2, 1),
            to: NaiveDate::from_ymd_opt(2025, 1, 1),
        };
        assert!(validate_range(&query).is_err());
    }

    #[test]
    fn export_file_is_dated() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        assert_eq!(export_filename(date), "salon-export-2025-06-30.json");
    }
}
