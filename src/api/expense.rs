use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::expense::Expense,
    utils::db_utils::{FilterValue, build_update_sql, execute_update, page_bounds, where_clause},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["category", "description", "amount", "expense_date"];

const COLUMNS: &str = "id, category, description, amount, expense_date, owner_id, created_at";

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateExpense {
    #[schema(example = "rent")]
    pub category: String,
    pub description: Option<String>,
    #[schema(example = 1800.0)]
    pub amount: f64,
    #[schema(example = "2025-06-01", value_type = String, format = "date")]
    pub expense_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ExpenseQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct ExpenseListResponse {
    pub data: Vec<Expense>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    /// Sum of every matching expense, not only this page
    pub total_amount: f64,
}

fn guard(auth: &AuthUser) -> AppResult<()> {
    auth.require_capability("manage_expenses")?;
    auth.require_feature("expenses")
}

async fn find_owned(pool: &MySqlPool, auth: &AuthUser, expense_id: u64) -> AppResult<Expense> {
    let sql = format!("SELECT {COLUMNS} FROM expenses WHERE id = ? AND owner_id = ?");
    sqlx::query_as::<_, Expense>(&sql)
        .bind(expense_id)
        .bind(auth.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense not found".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = CreateExpense,
    responses(
        (status = 201, description = "Expense recorded", body = Object, example = json!({
            "message": "Expense recorded", "id": 31
        })),
        (status = 400, description = "Invalid expense data"),
        (status = 403, description = "Admin only")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn create_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateExpense>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    if payload.category.trim().is_empty() {
        return Err(AppError::BadRequest("Category is required".to_string()));
    }
    if payload.amount <= 0.0 {
        return Err(AppError::BadRequest("Amount must be positive".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO expenses (category, description, amount, expense_date, owner_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.category.trim())
    .bind(payload.description.as_deref())
    .bind(payload.amount)
    .bind(payload.expense_date)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to record expense");
        AppError::from(e)
    })?;

    info!(expense_id = result.last_insert_id(), "Expense recorded");

    Ok(HttpResponse::Created().json(json!({
        "message": "Expense recorded",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    get,
    path = "/api/expenses",
    params(ExpenseQuery),
    responses(
        (status = 200, description = "Paginated expenses of the caller", body = ExpenseListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn list_expenses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExpenseQuery>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let mut conditions = vec!["owner_id = ?"];
    let mut bindings = vec![FilterValue::U64(auth.user_id)];

    if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        conditions.push("category = ?");
        bindings.push(FilterValue::Str(category.trim().to_string()));
    }
    if let Some(from) = query.from {
        conditions.push("expense_date >= ?");
        bindings.push(FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        conditions.push("expense_date <= ?");
        bindings.push(FilterValue::Date(to));
    }

    let where_sql = where_clause(&conditions);

    let totals_sql = format!(
        "SELECT COUNT(*), CAST(COALESCE(SUM(amount), 0) AS DOUBLE) FROM expenses {where_sql}"
    );
    debug!(sql = %totals_sql, bindings = ?bindings, "Totalling expenses");
    let mut totals_query = sqlx::query_as::<_, (i64, f64)>(&totals_sql);
    for b in &bindings {
        totals_query = b.bind_as(totals_query);
    }
    let (total, total_amount) = totals_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {COLUMNS} FROM expenses {where_sql} ORDER BY expense_date DESC, id DESC LIMIT ? OFFSET ?"
    );
    let mut data_query = sqlx::query_as::<_, Expense>(&data_sql);
    for b in &bindings {
        data_query = b.bind_as(data_query);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(ExpenseListResponse {
        data,
        page,
        per_page,
        total,
        total_amount,
    }))
}

#[utoipa::path(
    get,
    path = "/api/expenses/{expense_id}",
    params(("expense_id", Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense found", body = Expense),
        (status = 404, description = "Expense not found")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn get_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let expense = find_owned(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(expense))
}

#[utoipa::path(
    put,
    path = "/api/expenses/{expense_id}",
    params(("expense_id", Path, description = "Expense ID")),
    request_body(content = Object, description = "Fields to change", content_type = "application/json"),
    responses(
        (status = 200, description = "Expense updated"),
        (status = 400, description = "Unknown or empty fields"),
        (status = 404, description = "Expense not found")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn update_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let expense = find_owned(pool.get_ref(), &auth, path.into_inner()).await?;

    if body.get("amount").and_then(Value::as_f64).is_some_and(|a| a <= 0.0) {
        return Err(AppError::BadRequest("Amount must be positive".to_string()));
    }

    let update = build_update_sql("expenses", &body, UPDATABLE, "id", expense.id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Expense updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/expenses/{expense_id}",
    params(("expense_id", Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Expense not found")
    ),
    tag = "Expense",
    security(("bearer_auth" = []))
)]
pub async fn delete_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    let result = sqlx::query("DELETE FROM expenses WHERE id = ? AND owner_id = ?")
        .bind(path.into_inner())
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Expense not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
