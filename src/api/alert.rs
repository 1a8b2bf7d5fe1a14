use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::alert::{Alert, AlertSeverity},
    utils::db_utils::{FilterValue, page_bounds, where_clause},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const COLUMNS: &str =
    "id, alert_type, severity, title, message, is_read, related_table, related_id, created_at";

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateAlert {
    #[schema(example = "low_stock")]
    pub alert_type: String,
    pub severity: AlertSeverity,
    #[schema(example = "Low stock: Developer 20vol")]
    pub title: String,
    #[schema(example = "2 left, threshold is 5")]
    pub message: String,
    #[schema(example = "inventory_items")]
    pub related_table: Option<String>,
    pub related_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AlertQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub severity: Option<AlertSeverity>,
    pub unread_only: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct AlertListResponse {
    pub data: Vec<Alert>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub unread: i64,
}

pub async fn insert_alert(pool: &MySqlPool, alert: &CreateAlert) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alerts (alert_type, severity, title, message, related_table, related_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&alert.alert_type)
    .bind(alert.severity.as_ref())
    .bind(&alert.title)
    .bind(&alert.message)
    .bind(alert.related_table.as_deref())
    .bind(alert.related_id)
    .execute(pool)
    .await?;

    info!(alert_id = result.last_insert_id(), kind = %alert.alert_type, "Alert raised");
    Ok(result.last_insert_id())
}

/// Whether an unread alert of this type already points at the record.
pub async fn has_open_alert(
    pool: &MySqlPool,
    alert_type: &str,
    related_table: &str,
    related_id: u64,
) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM alerts
            WHERE alert_type = ? AND related_table = ? AND related_id = ? AND is_read = FALSE
        )
        "#,
    )
    .bind(alert_type)
    .bind(related_table)
    .bind(related_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

#[utoipa::path(
    get,
    path = "/api/alerts",
    params(AlertQuery),
    responses(
        (status = 200, description = "Paginated alerts, newest first", body = AlertListResponse)
    ),
    tag = "Alert",
    security(("bearer_auth" = []))
)]
pub async fn list_alerts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AlertQuery>,
) -> AppResult<HttpResponse> {
    auth.require_feature("alerts")?;

    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let mut conditions = Vec::new();
    let mut bindings: Vec<FilterValue> = Vec::new();

    if let Some(severity) = query.severity {
        conditions.push("severity = ?");
        bindings.push(FilterValue::Str(severity.to_string()));
    }
    if query.unread_only.unwrap_or(false) {
        conditions.push("is_read = FALSE");
    }

    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM alerts {where_sql}");
    debug!(sql = %count_sql, bindings = ?bindings, "Counting alerts");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = b.bind_scalar(count_query);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let unread = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM alerts WHERE is_read = FALSE")
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql =
        format!("SELECT {COLUMNS} FROM alerts {where_sql} ORDER BY created_at DESC LIMIT ? OFFSET ?");
    let mut data_query = sqlx::query_as::<_, Alert>(&data_sql);
    for b in &bindings {
        data_query = b.bind_as(data_query);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(AlertListResponse {
        data,
        page,
        per_page,
        total,
        unread,
    }))
}

#[utoipa::path(
    post,
    path = "/api/alerts",
    request_body = CreateAlert,
    responses(
        (status = 201, description = "Alert created", body = Object, example = json!({
            "message": "Alert created", "id": 9
        })),
        (status = 400, description = "Title and message are required")
    ),
    tag = "Alert",
    security(("bearer_auth" = []))
)]
pub async fn create_alert(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAlert>,
) -> AppResult<HttpResponse> {
    auth.require_feature("alerts")?;

    if payload.title.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("Title and message are required".to_string()));
    }
    if payload.alert_type.trim().is_empty() {
        return Err(AppError::BadRequest("Alert type is required".to_string()));
    }

    let id = insert_alert(pool.get_ref(), &payload).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Alert created",
        "id": id
    })))
}

#[utoipa::path(
    put,
    path = "/api/alerts/{alert_id}/read",
    params(("alert_id", Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert marked as read"),
        (status = 404, description = "Alert not found")
    ),
    tag = "Alert",
    security(("bearer_auth" = []))
)]
pub async fn mark_alert_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_feature("alerts")?;
    let alert_id = path.into_inner();

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM alerts WHERE id = ?)")
        .bind(alert_id)
        .fetch_one(pool.get_ref())
        .await?;
    if !exists {
        return Err(AppError::NotFound("Alert not found".to_string()));
    }

    sqlx::query("UPDATE alerts SET is_read = TRUE WHERE id = ?")
        .bind(alert_id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Alert marked as read" })))
}

#[utoipa::path(
    delete,
    path = "/api/alerts/{alert_id}",
    params(("alert_id", Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Alert not found")
    ),
    tag = "Alert",
    security(("bearer_auth" = []))
)]
pub async fn delete_alert(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_feature("alerts")?;

    let result = sqlx::query("DELETE FROM alerts WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Alert not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
