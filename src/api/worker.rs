use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::worker::{PaymentStatus, Worker, WorkerEarning},
    utils::db_utils::{FilterValue, build_update_sql, execute_update, page_bounds, where_clause},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["name", "role", "phone", "salary", "hire_date"];

const COLUMNS: &str =
    "id, name, role, phone, salary, payment_status, hire_date, total_earnings, created_at";

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateWorker {
    #[schema(example = "Sam Stylist")]
    pub name: String,
    #[schema(example = "senior stylist")]
    pub role: String,
    #[schema(example = "+15550001111")]
    pub phone: Option<String>,
    #[schema(example = 2400.0)]
    pub salary: f64,
    #[schema(example = "2024-03-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct PaymentUpdate {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct WorkerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub payment_status: Option<PaymentStatus>,
    /// Matches name or role
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkerListResponse {
    pub data: Vec<Worker>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct WorkerEarningsResponse {
    pub worker_id: u64,
    #[schema(example = 815.5)]
    pub total: f64,
    pub data: Vec<WorkerEarning>,
}

fn guard(auth: &AuthUser) -> AppResult<()> {
    auth.require_capability("manage_workers")?;
    auth.require_feature("workers")
}

async fn find_worker(pool: &MySqlPool, worker_id: u64) -> AppResult<Worker> {
    let sql = format!("SELECT {COLUMNS} FROM workers WHERE id = ?");
    sqlx::query_as::<_, Worker>(&sql)
        .bind(worker_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Worker not found".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/workers",
    request_body = CreateWorker,
    responses(
        (status = 201, description = "Worker created", body = Object, example = json!({
            "message": "Worker created", "id": 3
        })),
        (status = 400, description = "Invalid worker data"),
        (status = 403, description = "Admin only")
    ),
    tag = "Worker",
    security(("bearer_auth" = []))
)]
pub async fn create_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorker>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    if payload.name.trim().is_empty() || payload.role.trim().is_empty() {
        return Err(AppError::BadRequest("Name and role are required".to_string()));
    }
    if payload.salary < 0.0 {
        return Err(AppError::BadRequest("Salary cannot be negative".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO workers (name, role, phone, salary, payment_status, hire_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.role.trim())
    .bind(payload.phone.as_deref())
    .bind(payload.salary)
    .bind(PaymentStatus::Pending.as_ref())
    .bind(payload.hire_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create worker");
        AppError::from(e)
    })?;

    info!(worker_id = result.last_insert_id(), "Worker created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Worker created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    get,
    path = "/api/workers",
    params(WorkerQuery),
    responses(
        (status = 200, description = "Paginated worker list", body = WorkerListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Worker",
    security(("bearer_auth" = []))
)]
pub async fn list_workers(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WorkerQuery>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let mut conditions = Vec::new();
    let mut bindings: Vec<FilterValue> = Vec::new();

    if let Some(status) = query.payment_status {
        conditions.push("payment_status = ?");
        bindings.push(FilterValue::Str(status.to_string()));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("(name LIKE ? OR role LIKE ?)");
        let like = format!("%{}%", search.trim());
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like));
    }

    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM workers {where_sql}");
    debug!(sql = %count_sql, bindings = ?bindings, "Counting workers");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = b.bind_scalar(count_query);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql =
        format!("SELECT {COLUMNS} FROM workers {where_sql} ORDER BY name ASC LIMIT ? OFFSET ?");
    let mut data_query = sqlx::query_as::<_, Worker>(&data_sql);
    for b in &bindings {
        data_query = b.bind_as(data_query);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(WorkerListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/workers/{worker_id}",
    params(("worker_id", Path, description = "Worker ID")),
    responses(
        (status = 200, description = "Worker found", body = Worker),
        (status = 404, description = "Worker not found")
    ),
    tag = "Worker",
    security(("bearer_auth" = []))
)]
pub async fn get_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let worker = find_worker(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(worker))
}

#[utoipa::path(
    put,
    path = "/api/workers/{worker_id}",
    params(("worker_id", Path, description = "Worker ID")),
    request_body(content = Object, description = "Fields to change", content_type = "application/json"),
    responses(
        (status = 200, description = "Worker updated"),
        (status = 400, description = "Unknown or empty fields"),
        (status = 404, description = "Worker not found")
    ),
    tag = "Worker",
    security(("bearer_auth" = []))
)]
pub async fn update_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let worker_id = path.into_inner();
    find_worker(pool.get_ref(), worker_id).await?;

    if body.get("salary").and_then(Value::as_f64).is_some_and(|s| s < 0.0) {
        return Err(AppError::BadRequest("Salary cannot be negative".to_string()));
    }

    let update = build_update_sql("workers", &body, UPDATABLE, "id", worker_id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Worker updated" })))
}

/// Payroll: marks the worker's salary as pending or paid.
#[utoipa::path(
    put,
    path = "/api/workers/{worker_id}/payment",
    params(("worker_id", Path, description = "Worker ID")),
    request_body = PaymentUpdate,
    responses(
        (status = 200, description = "Payment status updated"),
        (status = 404, description = "Worker not found")
    ),
    tag = "Worker",
    security(("bearer_auth" = []))
)]
pub async fn set_payment_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<PaymentUpdate>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let worker_id = path.into_inner();

    let result = sqlx::query("UPDATE workers SET payment_status = ? WHERE id = ?")
        .bind(payload.payment_status.as_ref())
        .bind(worker_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        // MySQL reports 0 rows when the value is unchanged
        find_worker(pool.get_ref(), worker_id).await?;
    }

    info!(worker_id, status = %payload.payment_status, "Worker payment status changed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Payment status updated",
        "payment_status": payload.payment_status
    })))
}

#[utoipa::path(
    get,
    path = "/api/workers/{worker_id}/earnings",
    params(("worker_id", Path, description = "Worker ID")),
    responses(
        (status = 200, description = "Commission earnings", body = WorkerEarningsResponse),
        (status = 404, description = "Worker not found")
    ),
    tag = "Worker",
    security(("bearer_auth" = []))
)]
pub async fn list_earnings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let worker = find_worker(pool.get_ref(), path.into_inner()).await?;

    let data = sqlx::query_as::<_, WorkerEarning>(
        r#"
        SELECT id, worker_id, service_id, amount, commission_rate, created_at
        FROM worker_earnings
        WHERE worker_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(worker.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(WorkerEarningsResponse {
        worker_id: worker.id,
        total: worker.total_earnings,
        data,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/workers/{worker_id}",
    params(("worker_id", Path, description = "Worker ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Worker not found")
    ),
    tag = "Worker",
    security(("bearer_auth" = []))
)]
pub async fn delete_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let worker_id = path.into_inner();

    let result = sqlx::query("DELETE FROM workers WHERE id = ?")
        .bind(worker_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, worker_id, "Failed to delete worker");
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Worker not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
