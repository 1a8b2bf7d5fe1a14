use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::customer::Customer,
    utils::db_utils::{FilterValue, build_update_sql, execute_update, page_bounds, where_clause},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["name", "phone", "email", "preferred_style", "hair_type", "notes"];

const COLUMNS: &str =
    "id, name, phone, email, preferred_style, hair_type, notes, owner_id, created_at";

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateCustomer {
    #[schema(example = "Jane Roe")]
    pub name: String,
    #[schema(example = "+15551234567")]
    pub phone: Option<String>,
    #[schema(example = "jane@example.com", format = "email")]
    pub email: Option<String>,
    #[schema(example = "bob cut")]
    pub preferred_style: Option<String>,
    #[schema(example = "curly")]
    pub hair_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct CustomerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches name, phone or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CustomerListResponse {
    pub data: Vec<Customer>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

/// Fails with 404 when the customer does not exist or belongs to someone
/// else and the caller cannot see every customer.
async fn find_visible(pool: &MySqlPool, auth: &AuthUser, customer_id: u64) -> AppResult<Customer> {
    let sql = format!("SELECT {COLUMNS} FROM customers WHERE id = ?");
    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;

    match customer {
        Some(c) if auth.can_view_all_customers() || c.owner_id == auth.user_id => Ok(c),
        _ => Err(AppError::NotFound("Customer not found".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CreateCustomer,
    responses(
        (status = 201, description = "Customer created", body = Object, example = json!({
            "message": "Customer created", "id": 12
        })),
        (status = 400, description = "Name is required")
    ),
    tag = "Customer",
    security(("bearer_auth" = []))
)]
pub async fn create_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateCustomer>,
) -> AppResult<HttpResponse> {
    auth.require_feature("customers")?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Customer name is required".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO customers
        (name, phone, email, preferred_style, hair_type, notes, owner_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(payload.phone.as_deref())
    .bind(payload.email.as_deref())
    .bind(payload.preferred_style.as_deref())
    .bind(payload.hair_type.as_deref())
    .bind(payload.notes.as_deref())
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create customer");
        AppError::from(e)
    })?;

    info!(customer_id = result.last_insert_id(), "Customer created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Customer created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    get,
    path = "/api/customers",
    params(CustomerQuery),
    responses(
        (status = 200, description = "Paginated customer list", body = CustomerListResponse)
    ),
    tag = "Customer",
    security(("bearer_auth" = []))
)]
pub async fn list_customers(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CustomerQuery>,
) -> AppResult<HttpResponse> {
    auth.require_feature("customers")?;

    let (page, per_page, offset) = page_bounds(query.page, query.per_page, 20);

    let mut conditions = Vec::new();
    let mut bindings: Vec<FilterValue> = Vec::new();

    if !auth.can_view_all_customers() {
        conditions.push("owner_id = ?");
        bindings.push(FilterValue::U64(auth.user_id));
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("(name LIKE ? OR phone LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search.trim());
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like));
    }

    let where_clause = where_clause(&conditions);

    let count_sql = format!("SELECT COUNT(*) FROM customers {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting customers");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = b.bind_scalar(count_query);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {COLUMNS} FROM customers {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut data_query = sqlx::query_as::<_, Customer>(&data_sql);
    for b in &bindings {
        data_query = b.bind_as(data_query);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %data_sql, "Failed to fetch customers");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(CustomerListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/customers/{customer_id}",
    params(("customer_id", Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer found", body = Customer),
        (status = 404, description = "Customer not found")
    ),
    tag = "Customer",
    security(("bearer_auth" = []))
)]
pub async fn get_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_feature("customers")?;
    let customer = find_visible(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(customer))
}

#[utoipa::path(
    put,
    path = "/api/customers/{customer_id}",
    params(("customer_id", Path, description = "Customer ID")),
    request_body(content = Object, description = "Fields to change", content_type = "application/json"),
    responses(
        (status = 200, description = "Customer updated"),
        (status = 400, description = "Unknown or empty fields"),
        (status = 404, description = "Customer not found")
    ),
    tag = "Customer",
    security(("bearer_auth" = []))
)]
pub async fn update_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_feature("customers")?;
    let customer_id = path.into_inner();
    find_visible(pool.get_ref(), &auth, customer_id).await?;

    if let Some(name) = body.get("name") {
        if name.as_str().is_none_or(|n| n.trim().is_empty()) {
            return Err(AppError::BadRequest("Customer name is required".to_string()));
        }
    }

    let update = build_update_sql("customers", &body, UPDATABLE, "id", customer_id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Customer updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{customer_id}",
    params(("customer_id", Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Customer not found")
    ),
    tag = "Customer",
    security(("bearer_auth" = []))
)]
pub async fn delete_customer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_feature("customers")?;
    let customer_id = path.into_inner();
    find_visible(pool.get_ref(), &auth, customer_id).await?;

    sqlx::query("DELETE FROM customers WHERE id = ?")
        .bind(customer_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, customer_id, "Failed to delete customer");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
