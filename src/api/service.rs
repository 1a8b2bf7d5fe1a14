use crate::{
    api::inventory::{ITEM_COLUMNS, raise_low_stock_alerts},
    auth::auth::AuthUser,
    completion::{CompletionCheck, CompletionError, CompletionOutcome, EarningsOutcome},
    error::{AppError, AppResult},
    model::{
        inventory::InventoryItem,
        service::{Service, ServiceItem, ServiceStatus},
    },
    registry::AppRegistry,
    repository::inventory::SERVICE_COLUMNS,
    utils::{
        db_utils::{FilterValue, build_update_sql, execute_update, page_bounds, where_clause},
        notification_store::Notification,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info, warn};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &[
    "service_name",
    "price",
    "worker_id",
    "commission_rate",
    "scheduled_at",
    "notes",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateService {
    #[schema(example = 12)]
    pub customer_id: u64,
    #[schema(example = 3)]
    pub worker_id: Option<u64>,
    #[schema(example = "Balayage")]
    pub service_name: String,
    #[schema(example = 120.0)]
    pub price: f64,
    /// Percentage of the price credited to the worker
    #[schema(example = 25.0)]
    pub commission_rate: Option<f64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: ServiceStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct AddServiceItem {
    #[schema(example = 7)]
    pub item_id: u64,
    #[schema(example = 2)]
    pub quantity: i32,
    /// Defaults to the inventory item's unit price
    pub unit_price: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ServiceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ServiceStatus>,
    pub customer_id: Option<u64>,
    pub worker_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct ServiceListResponse {
    pub data: Vec<Service>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub service_id: u64,
    pub can_complete: bool,
    pub check: CompletionCheck,
}

fn validate_commission(rate: Option<f64>) -> AppResult<()> {
    match rate {
        Some(r) if !(0.0..=100.0).contains(&r) => Err(AppError::BadRequest(
            "Commission rate must be between 0 and 100".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Field checks for a partial update, applied before any SQL is built.
fn validate_patch(body: &Value) -> AppResult<()> {
    if body.get("status").is_some() {
        return Err(AppError::BadRequest(
            "Use the status endpoint to change the service status".to_string(),
        ));
    }
    if let Some(price) = body.get("price") {
        match price.as_f64() {
            Some(p) if p >= 0.0 => {}
            _ => {
                return Err(AppError::BadRequest(
                    "Price must be a non-negative number".to_string(),
                ));
            }
        }
    }
    match body.get("commission_rate") {
        None | Some(Value::Null) => Ok(()),
        Some(rate) => match rate.as_f64() {
            Some(r) => validate_commission(Some(r)),
            None => Err(AppError::BadRequest(
                "Commission rate must be a number".to_string(),
            )),
        },
    }
}

/// Fails with 404 when the service does not exist or was created by someone
/// else and the caller cannot see every customer.
async fn find_visible(pool: &MySqlPool, auth: &AuthUser, service_id: u64) -> AppResult<Service> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?");
    let service = sqlx::query_as::<_, Service>(&sql)
        .bind(service_id)
        .fetch_optional(pool)
        .await?;

    match service {
        Some(s) if auth.can_view_all_customers() || s.created_by == auth.user_id => Ok(s),
        _ => Err(AppError::NotFound("Service not found".to_string())),
    }
}

/// Line items can only change while the service is still open.
fn ensure_open(service: &Service) -> AppResult<()> {
    let status = service.status()?;
    if status.is_open() {
        Ok(())
    } else {
        Err(AppError::Conflict(format!("Service is already {status}")))
    }
}

fn guard(auth: &AuthUser) -> AppResult<()> {
    auth.require_feature("services")?;
    auth.require_capability("manage_services")
}

#[utoipa::path(
    post,
    path = "/api/services",
    request_body = CreateService,
    responses(
        (status = 201, description = "Service created", body = Object, example = json!({
            "message": "Service created", "id": 40
        })),
        (status = 400, description = "Invalid service data"),
        (status = 404, description = "Customer not found")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn create_service(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateService>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    if payload.service_name.trim().is_empty() {
        return Err(AppError::BadRequest("Service name is required".to_string()));
    }
    if payload.price < 0.0 {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }
    validate_commission(payload.commission_rate)?;

    let owner = sqlx::query_scalar::<_, u64>("SELECT owner_id FROM customers WHERE id = ?")
        .bind(payload.customer_id)
        .fetch_optional(pool.get_ref())
        .await?;
    match owner {
        Some(owner_id) if auth.can_view_all_customers() || owner_id == auth.user_id => {}
        _ => return Err(AppError::NotFound("Customer not found".to_string())),
    }

    let result = sqlx::query(
        r#"
        INSERT INTO services
        (customer_id, worker_id, service_name, price, status, commission_rate,
         scheduled_at, notes, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.customer_id)
    .bind(payload.worker_id)
    .bind(payload.service_name.trim())
    .bind(payload.price)
    .bind(ServiceStatus::Pending.as_ref())
    .bind(payload.commission_rate)
    .bind(payload.scheduled_at.unwrap_or_else(Utc::now))
    .bind(payload.notes.as_deref())
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create service");
        AppError::from(e)
    })?;

    info!(service_id = result.last_insert_id(), "Service created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Service created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    get,
    path = "/api/services",
    params(ServiceQuery),
    responses(
        (status = 200, description = "Paginated service list", body = ServiceListResponse)
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn list_services(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ServiceQuery>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let mut conditions = Vec::new();
    let mut bindings: Vec<FilterValue> = Vec::new();

    if !auth.can_view_all_customers() {
        conditions.push("created_by = ?");
        bindings.push(FilterValue::U64(auth.user_id));
    }
    if let Some(status) = query.status {
        conditions.push("status = ?");
        bindings.push(FilterValue::Str(status.to_string()));
    }
    if let Some(customer_id) = query.customer_id {
        conditions.push("customer_id = ?");
        bindings.push(FilterValue::U64(customer_id));
    }
    if let Some(worker_id) = query.worker_id {
        conditions.push("worker_id = ?");
        bindings.push(FilterValue::U64(worker_id));
    }
    if let Some(from) = query.from {
        conditions.push("DATE(scheduled_at) >= ?");
        bindings.push(FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        conditions.push("DATE(scheduled_at) <= ?");
        bindings.push(FilterValue::Date(to));
    }

    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM services {where_sql}");
    debug!(sql = %count_sql, bindings = ?bindings, "Counting services");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = b.bind_scalar(count_query);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM services {where_sql} ORDER BY scheduled_at DESC LIMIT ? OFFSET ?"
    );
    let mut data_query = sqlx::query_as::<_, Service>(&data_sql);
    for b in &bindings {
        data_query = b.bind_as(data_query);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %data_sql, "Failed to fetch services");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(ServiceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/services/{service_id}",
    params(("service_id", Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service found", body = Service),
        (status = 404, description = "Service not found")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn get_service(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let service = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(service))
}

#[utoipa::path(
    put,
    path = "/api/services/{service_id}",
    params(("service_id", Path, description = "Service ID")),
    request_body(content = Object, description = "Fields to change", content_type = "application/json"),
    responses(
        (status = 200, description = "Service updated"),
        (status = 400, description = "Unknown or empty fields"),
        (status = 404, description = "Service not found")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn update_service(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let service_id = path.into_inner();
    find_visible(pool.get_ref(), &auth, service_id).await?;

    validate_patch(&body)?;

    let update = build_update_sql("services", &body, UPDATABLE, "id", service_id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Service updated" })))
}

/// Manual status change. Completion has its own endpoint because it
/// touches stock.
#[utoipa::path(
    put,
    path = "/api/services/{service_id}/status",
    params(("service_id", Path, description = "Service ID")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Completion must use the complete endpoint"),
        (status = 409, description = "Service is closed")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<StatusUpdate>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let service = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;
    let current = service.status()?;
    let next = payload.status;

    if next == ServiceStatus::Completed {
        return Err(AppError::BadRequest(
            "Use the complete endpoint to finish a service".to_string(),
        ));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Cannot move a {current} service to {next}"
        )));
    }

    sqlx::query("UPDATE services SET status = ? WHERE id = ?")
        .bind(next.as_ref())
        .bind(service.id)
        .execute(pool.get_ref())
        .await?;

    info!(service_id = service.id, from = %current, to = %next, "Service status changed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Status updated",
        "status": next
    })))
}

#[utoipa::path(
    delete,
    path = "/api/services/{service_id}",
    params(("service_id", Path, description = "Service ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Completed services are kept")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn delete_service(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let service = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;

    if service.status()? == ServiceStatus::Completed {
        return Err(AppError::Conflict(
            "Completed services cannot be deleted".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM service_products WHERE service_id = ?")
        .bind(service.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM services WHERE id = ?")
        .bind(service.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/services/{service_id}/items",
    params(("service_id", Path, description = "Service ID")),
    responses(
        (status = 200, description = "Inventory lines of the service", body = [ServiceItem]),
        (status = 404, description = "Service not found")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn list_items(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let service = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;

    let items = sqlx::query_as::<_, ServiceItem>(
        r#"
        SELECT id, service_id, item_id, quantity, unit_price, line_total
        FROM service_products
        WHERE service_id = ?
        ORDER BY id
        "#,
    )
    .bind(service.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(items))
}

#[utoipa::path(
    post,
    path = "/api/services/{service_id}/items",
    params(("service_id", Path, description = "Service ID")),
    request_body = AddServiceItem,
    responses(
        (status = 201, description = "Line item added", body = ServiceItem),
        (status = 400, description = "Quantity must be positive"),
        (status = 404, description = "Service or inventory item not found"),
        (status = 409, description = "Service is closed")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn add_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AddServiceItem>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let service = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;
    ensure_open(&service)?;

    if payload.quantity <= 0 {
        return Err(AppError::BadRequest("Quantity must be positive".to_string()));
    }

    let item_sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = ?");
    let item = sqlx::query_as::<_, InventoryItem>(&item_sql)
        .bind(payload.item_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item not found".to_string()))?;

    let unit_price = payload.unit_price.unwrap_or(item.unit_price);
    if unit_price < 0.0 {
        return Err(AppError::BadRequest("Unit price cannot be negative".to_string()));
    }
    let line_total = f64::from(payload.quantity) * unit_price;

    let result = sqlx::query(
        r#"
        INSERT INTO service_products (service_id, item_id, quantity, unit_price, line_total)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(service.id)
    .bind(item.id)
    .bind(payload.quantity)
    .bind(unit_price)
    .bind(line_total)
    .execute(pool.get_ref())
    .await?;

    if item.current_stock < payload.quantity {
        // allowed, completion is blocked until restocked
        warn!(service_id = service.id, item_id = item.id, "Line item exceeds current stock");
    }

    Ok(HttpResponse::Created().json(ServiceItem {
        id: result.last_insert_id(),
        service_id: service.id,
        item_id: item.id,
        quantity: payload.quantity,
        unit_price,
        line_total,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/services/{service_id}/items/{item_id}",
    params(
        ("service_id", Path, description = "Service ID"),
        ("item_id", Path, description = "Line item ID")
    ),
    responses(
        (status = 200, description = "Line item removed"),
        (status = 404, description = "Line item not found"),
        (status = 409, description = "Service is closed")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn remove_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let (service_id, line_id) = path.into_inner();
    let service = find_visible(pool.get_ref(), &auth, service_id).await?;
    ensure_open(&service)?;

    let result = sqlx::query("DELETE FROM service_products WHERE id = ? AND service_id = ?")
        .bind(line_id)
        .bind(service.id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Line item not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Line item removed" })))
}

#[utoipa::path(
    get,
    path = "/api/services/{service_id}/availability",
    params(("service_id", Path, description = "Service ID")),
    responses(
        (status = 200, description = "Stock check for every line item", body = AvailabilityResponse),
        (status = 404, description = "Service not found")
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn availability(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    registry: web::Data<AppRegistry>,
    path: web::Path<u64>,
) -> Result<HttpResponse, CompletionError> {
    guard(&auth)?;
    let service = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;

    let check = registry.completion().check(service.id).await?;

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        service_id: service.id,
        can_complete: check.can_complete(),
        check,
    }))
}

/// Completes the service, deducting its inventory lines from stock.
#[utoipa::path(
    post,
    path = "/api/services/{service_id}/complete",
    params(("service_id", Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service completed", body = CompletionOutcome),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Insufficient stock or service already closed", body = Object,
            example = json!({
                "error": "insufficient_stock",
                "message": "Insufficient stock for 1 item(s)",
                "shortages": [{
                    "item_id": 7, "item_name": "Developer 20vol",
                    "required_quantity": 5, "available_stock": 2, "shortage": 3
                }]
            }))
    ),
    tag = "Service",
    security(("bearer_auth" = []))
)]
pub async fn complete_service(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    registry: web::Data<AppRegistry>,
    path: web::Path<u64>,
) -> Result<HttpResponse, CompletionError> {
    guard(&auth)?;
    let service = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;

    let outcome = registry.completion().confirm(service.id).await?;

    if !outcome.deducted_items.is_empty() {
        if let Err(e) = raise_low_stock_alerts(pool.get_ref(), &outcome.deducted_items).await {
            error!(error = %e, service_id = service.id, "Low-stock check failed");
        }
    }

    let notification = match &outcome.earnings {
        EarningsOutcome::Failed { message } => Notification::new(
            "warning",
            "Service completed",
            format!("{} completed, but worker earnings were not recorded: {message}", service.service_name),
        ),
        _ => Notification::new(
            "success",
            "Service completed",
            format!("{} completed", service.service_name),
        ),
    };
    registry.notifications().push(auth.user_id, notification).await;

    Ok(HttpResponse::Ok().json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rejects_bad_money_fields() {
        assert!(validate_patch(&json!({"price": -5.0})).is_err());
        assert!(validate_patch(&json!({"price": "20"})).is_err());
        assert!(validate_patch(&json!({"commission_rate": "150"})).is_err());
        assert!(validate_patch(&json!({"commission_rate": 150})).is_err());
        assert!(validate_patch(&json!({"status": "completed"})).is_err());
    }

    #[test]
    fn patch_accepts_valid_fields() {
        assert!(validate_patch(&json!({"price": 0, "commission_rate": 30.5})).is_ok());
        assert!(validate_patch(&json!({"commission_rate": null, "notes": "fringe"})).is_ok());
    }
}
