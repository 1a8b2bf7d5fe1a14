use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    registry::AppRegistry,
    utils::notification_store::Notification,
};
use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct NotificationList {
    pub data: Vec<Notification>,
    pub unread: usize,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    responses((status = 200, description = "Caller's notifications, newest first", body = NotificationList)),
    tag = "Notification",
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    auth: AuthUser,
    registry: web::Data<AppRegistry>,
) -> AppResult<HttpResponse> {
    auth.require_feature("notifications")?;
    let data = registry.notifications().list(auth.user_id).await;
    let unread = data.iter().filter(|n| !n.read).count();
    Ok(HttpResponse::Ok().json(NotificationList { data, unread }))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}/read",
    params(("notification_id", Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Notification not found")
    ),
    tag = "Notification",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    auth: AuthUser,
    registry: web::Data<AppRegistry>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    auth.require_feature("notifications")?;

    if !registry
        .notifications()
        .mark_read(auth.user_id, &path.into_inner())
        .await
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Marked as read" })))
}

#[utoipa::path(
    delete,
    path = "/api/notifications",
    responses((status = 204, description = "All notifications cleared")),
    tag = "Notification",
    security(("bearer_auth" = []))
)]
pub async fn clear_notifications(
    auth: AuthUser,
    registry: web::Data<AppRegistry>,
) -> AppResult<HttpResponse> {
    auth.require_feature("notifications")?;
    registry.notifications().clear(auth.user_id).await;
    Ok(HttpResponse::NoContent().finish())
}
