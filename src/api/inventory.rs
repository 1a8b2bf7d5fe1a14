use crate::{
    api::alert::{CreateAlert, has_open_alert, insert_alert},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        alert::AlertSeverity,
        inventory::{InventoryCategory, InventoryItem, InventoryTransaction, Product, TransactionKind},
    },
    realtime::BusEvent,
    registry::AppRegistry,
    utils::db_utils::{FilterValue, build_update_sql, execute_update, page_bounds, where_clause},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

pub const ITEM_COLUMNS: &str = "id, name, category_id, current_stock, min_threshold, \
     max_threshold, unit_price, supplier, expiry_date, created_at";

/// Stock is only changed through adjustments, never a plain update.
const UPDATABLE: &[&str] = &[
    "name",
    "category_id",
    "min_threshold",
    "max_threshold",
    "unit_price",
    "supplier",
    "expiry_date",
];

const LOW_STOCK: &str = "low_stock";

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateItem {
    #[schema(example = "Developer 20vol")]
    pub name: String,
    pub category_id: Option<u64>,
    #[schema(example = 12)]
    pub current_stock: i32,
    #[schema(example = 5)]
    pub min_threshold: i32,
    pub max_threshold: Option<i32>,
    #[schema(example = 8.5)]
    pub unit_price: f64,
    pub supplier: Option<String>,
    #[schema(example = "2027-01-31", value_type = String, format = "date")]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct StockAdjustment {
    pub kind: TransactionKind,
    /// Positive for `in` and `out`; a signed delta for `adjustment`
    #[schema(example = 4)]
    pub quantity: i32,
    pub note: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCategory {
    #[schema(example = "Colour")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProduct {
    #[schema(example = "Argan oil 100ml")]
    pub name: String,
    #[schema(example = 19.9)]
    pub price: f64,
    pub inventory_item_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ItemQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category_id: Option<u64>,
    /// Only items at or below their minimum threshold
    pub low_stock: Option<bool>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ItemListResponse {
    pub data: Vec<InventoryItem>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Signed stock change for an adjustment request.
pub fn stock_delta(kind: TransactionKind, quantity: i32) -> AppResult<i32> {
    match kind {
        TransactionKind::In | TransactionKind::Out if quantity <= 0 => Err(AppError::BadRequest(
            "Quantity must be positive".to_string(),
        )),
        TransactionKind::In => Ok(quantity),
        TransactionKind::Out => Ok(-quantity),
        TransactionKind::Adjustment if quantity == 0 => Err(AppError::BadRequest(
            "Adjustment must change the stock".to_string(),
        )),
        TransactionKind::Adjustment => Ok(quantity),
    }
}

/// Alert for an item at or below its minimum threshold.
pub fn low_stock_alert(item: &InventoryItem) -> Option<CreateAlert> {
    if !item.is_low_stock() {
        return None;
    }
    let severity = if item.current_stock <= 0 {
        AlertSeverity::Critical
    } else {
        AlertSeverity::High
    };
    Some(CreateAlert {
        alert_type: LOW_STOCK.to_string(),
        severity,
        title: format!("Low stock: {}", item.name),
        message: format!(
            "{} left, minimum is {}",
            item.current_stock, item.min_threshold
        ),
        related_table: Some("inventory_items".to_string()),
        related_id: Some(item.id),
    })
}

/// Raises one unread low-stock alert per item that needs restocking.
/// Returns the number of alerts created.
pub async fn raise_low_stock_alerts(pool: &MySqlPool, item_ids: &[u64]) -> AppResult<u64> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = ?");
    let mut raised = 0;

    for &item_id in item_ids {
        let Some(item) = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(item_id)
            .fetch_optional(pool)
            .await?
        else {
            continue;
        };

        let Some(alert) = low_stock_alert(&item) else {
            continue;
        };
        if has_open_alert(pool, LOW_STOCK, "inventory_items", item.id).await? {
            continue;
        }
        insert_alert(pool, &alert).await?;
        raised += 1;
    }

    Ok(raised)
}

async fn find_item(pool: &MySqlPool, item_id: u64) -> AppResult<InventoryItem> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = ?");
    sqlx::query_as::<_, InventoryItem>(&sql)
        .bind(item_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory item not found".to_string()))
}

fn guard(auth: &AuthUser) -> AppResult<()> {
    auth.require_feature("inventory")?;
    auth.require_capability("manage_inventory")
}

#[utoipa::path(
    post,
    path = "/api/inventory/items",
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Object, example = json!({
            "message": "Item created", "id": 7
        })),
        (status = 400, description = "Invalid item data")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateItem>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Item name is required".to_string()));
    }
    if payload.current_stock < 0 || payload.min_threshold < 0 || payload.unit_price < 0.0 {
        return Err(AppError::BadRequest(
            "Stock, threshold and price cannot be negative".to_string(),
        ));
    }
    if payload.max_threshold.is_some_and(|max| max < payload.min_threshold) {
        return Err(AppError::BadRequest(
            "Maximum threshold is below the minimum".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO inventory_items
        (name, category_id, current_stock, min_threshold, max_threshold, unit_price, supplier, expiry_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.category_id)
    .bind(payload.current_stock)
    .bind(payload.min_threshold)
    .bind(payload.max_threshold)
    .bind(payload.unit_price)
    .bind(payload.supplier.as_deref())
    .bind(payload.expiry_date)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create inventory item");
        AppError::from(e)
    })?;
    let item_id = result.last_insert_id();

    if payload.current_stock > 0 {
        sqlx::query(
            "INSERT INTO inventory_transactions (item_id, quantity, kind, note) VALUES (?, ?, ?, 'initial stock')",
        )
        .bind(item_id)
        .bind(payload.current_stock)
        .bind(TransactionKind::In.as_ref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(item_id, "Inventory item created");
    raise_low_stock_alerts(pool.get_ref(), &[item_id]).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Item created",
        "id": item_id
    })))
}

#[utoipa::path(
    get,
    path = "/api/inventory/items",
    params(ItemQuery),
    responses(
        (status = 200, description = "Paginated inventory", body = ItemListResponse)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_items(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ItemQuery>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 50);

    let mut conditions = Vec::new();
    let mut bindings: Vec<FilterValue> = Vec::new();

    if let Some(category_id) = query.category_id {
        conditions.push("category_id = ?");
        bindings.push(FilterValue::U64(category_id));
    }
    if query.low_stock.unwrap_or(false) {
        conditions.push("current_stock <= min_threshold");
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("(name LIKE ? OR supplier LIKE ?)");
        let like = format!("%{}%", search.trim());
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like));
    }

    let where_sql = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM inventory_items {where_sql}");
    debug!(sql = %count_sql, bindings = ?bindings, "Counting inventory items");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = b.bind_scalar(count_query);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items {where_sql} ORDER BY name ASC LIMIT ? OFFSET ?"
    );
    let mut data_query = sqlx::query_as::<_, InventoryItem>(&data_sql);
    for b in &bindings {
        data_query = b.bind_as(data_query);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(ItemListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/inventory/items/{item_id}",
    params(("item_id", Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Item found", body = InventoryItem),
        (status = 404, description = "Inventory item not found")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn get_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let item = find_item(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[utoipa::path(
    put,
    path = "/api/inventory/items/{item_id}",
    params(("item_id", Path, description = "Inventory item ID")),
    request_body(content = Object, description = "Fields to change", content_type = "application/json"),
    responses(
        (status = 200, description = "Item updated"),
        (status = 400, description = "Unknown or empty fields"),
        (status = 404, description = "Inventory item not found")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn update_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    registry: web::Data<AppRegistry>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let item_id = path.into_inner();
    find_item(pool.get_ref(), item_id).await?;

    if body.get("current_stock").is_some() {
        return Err(AppError::BadRequest(
            "Use a stock adjustment to change the stock level".to_string(),
        ));
    }

    let update = build_update_sql("inventory_items", &body, UPDATABLE, "id", item_id)?;
    execute_update(pool.get_ref(), update).await?;

    // a raised threshold can make the item low on stock
    if body.get("min_threshold").is_some() {
        raise_low_stock_alerts(pool.get_ref(), &[item_id]).await?;
    }

    registry.bus().publish(BusEvent::InventoryDataChanged {
        service_id: None,
        item_ids: vec![item_id],
    });

    Ok(HttpResponse::Ok().json(json!({ "message": "Item updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/items/{item_id}",
    params(("item_id", Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Inventory item not found"),
        (status = 409, description = "Item is used by a service")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn delete_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    registry: web::Data<AppRegistry>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let item_id = path.into_inner();

    let in_use = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM service_products WHERE item_id = ?)",
    )
    .bind(item_id)
    .fetch_one(pool.get_ref())
    .await?;
    if in_use {
        return Err(AppError::Conflict(
            "Item is used by a service and cannot be deleted".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM inventory_transactions WHERE item_id = ?")
        .bind(item_id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM inventory_items WHERE id = ?")
        .bind(item_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Inventory item not found".to_string()));
    }
    tx.commit().await?;

    registry.bus().publish(BusEvent::InventoryDataChanged {
        service_id: None,
        item_ids: vec![item_id],
    });

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Moves stock in or out and records the transaction.
#[utoipa::path(
    post,
    path = "/api/inventory/items/{item_id}/adjust",
    params(("item_id", Path, description = "Inventory item ID")),
    request_body = StockAdjustment,
    responses(
        (status = 200, description = "Stock adjusted", body = InventoryItem),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Inventory item not found"),
        (status = 409, description = "Not enough stock")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn adjust_stock(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    registry: web::Data<AppRegistry>,
    path: web::Path<u64>,
    payload: web::Json<StockAdjustment>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let item_id = path.into_inner();
    let delta = stock_delta(payload.kind, payload.quantity)?;
    let item = find_item(pool.get_ref(), item_id).await?;

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE inventory_items SET current_stock = current_stock + ? WHERE id = ? AND current_stock + ? >= 0",
    )
    .bind(delta)
    .bind(item.id)
    .bind(delta)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "Insufficient stock: {} available",
            item.current_stock
        )));
    }

    sqlx::query(
        "INSERT INTO inventory_transactions (item_id, quantity, kind, note) VALUES (?, ?, ?, ?)",
    )
    .bind(item.id)
    .bind(delta)
    .bind(payload.kind.as_ref())
    .bind(payload.note.as_deref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(item_id, delta, kind = %payload.kind, "Stock adjusted");

    if delta < 0 {
        raise_low_stock_alerts(pool.get_ref(), &[item_id]).await?;
    }
    registry.bus().publish(BusEvent::InventoryDataChanged {
        service_id: None,
        item_ids: vec![item_id],
    });

    let item = find_item(pool.get_ref(), item_id).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[utoipa::path(
    get,
    path = "/api/inventory/items/{item_id}/transactions",
    params(("item_id", Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Stock movements, newest first", body = [InventoryTransaction]),
        (status = 404, description = "Inventory item not found")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_transactions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let item = find_item(pool.get_ref(), path.into_inner()).await?;

    let data = sqlx::query_as::<_, InventoryTransaction>(
        r#"
        SELECT id, item_id, quantity, kind, service_id, note, created_at
        FROM inventory_transactions
        WHERE item_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 200
        "#,
    )
    .bind(item.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(data))
}

#[utoipa::path(
    get,
    path = "/api/inventory/categories",
    responses((status = 200, description = "All categories", body = [InventoryCategory])),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_categories(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let data = sqlx::query_as::<_, InventoryCategory>(
        "SELECT id, name, description FROM inventory_categories ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(data))
}

#[utoipa::path(
    post,
    path = "/api/inventory/categories",
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created"),
        (status = 409, description = "Category already exists")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_category(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateCategory>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }

    let result = sqlx::query("INSERT INTO inventory_categories (name, description) VALUES (?, ?)")
        .bind(payload.name.trim())
        .bind(payload.description.as_deref())
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Category created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/categories/{category_id}",
    params(("category_id", Path, description = "Category ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Category not found")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn delete_category(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let category_id = path.into_inner();

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE inventory_items SET category_id = NULL WHERE category_id = ?")
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM inventory_categories WHERE id = ?")
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Category not found".to_string()));
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/inventory/products",
    responses((status = 200, description = "Retail catalog", body = [Product])),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_products(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let data = sqlx::query_as::<_, Product>(
        "SELECT id, name, price, inventory_item_id FROM products ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(data))
}

#[utoipa::path(
    post,
    path = "/api/inventory/products",
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid product data")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_product(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProduct>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    if payload.name.trim().is_empty() || payload.price < 0.0 {
        return Err(AppError::BadRequest(
            "Product needs a name and a non-negative price".to_string(),
        ));
    }
    if let Some(item_id) = payload.inventory_item_id {
        find_item(pool.get_ref(), item_id).await?;
    }

    let result =
        sqlx::query("INSERT INTO products (name, price, inventory_item_id) VALUES (?, ?, ?)")
            .bind(payload.name.trim())
            .bind(payload.price)
            .bind(payload.inventory_item_id)
            .execute(pool.get_ref())
            .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Product created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/products/{product_id}",
    params(("product_id", Path, description = "Product ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Product not found")
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn delete_product(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;

    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(current_stock: i32, min_threshold: i32) -> InventoryItem {
        InventoryItem {
            id: 7,
            name: "Developer 20vol".into(),
            category_id: None,
            current_stock,
            min_threshold,
            max_threshold: None,
            unit_price: 8.5,
            supplier: None,
            expiry_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn out_and_in_need_positive_quantities() {
        assert_eq!(stock_delta(TransactionKind::In, 4).unwrap(), 4);
        assert_eq!(stock_delta(TransactionKind::Out, 4).unwrap(), -4);
        assert!(stock_delta(TransactionKind::Out, -4).is_err());
        assert!(stock_delta(TransactionKind::In, 0).is_err());
    }

    #[test]
    fn adjustments_are_signed() {
        assert_eq!(stock_delta(TransactionKind::Adjustment, -3).unwrap(), -3);
        assert!(stock_delta(TransactionKind::Adjustment, 0).is_err());
    }

    #[test]
    fn alert_raised_at_threshold() {
        assert!(low_stock_alert(&item(6, 5)).is_none());

        let alert = low_stock_alert(&item(5, 5)).unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.related_id, Some(7));

        let empty = low_stock_alert(&item(0, 5)).unwrap();
        assert_eq!(empty.severity, AlertSeverity::Critical);
    }
}
