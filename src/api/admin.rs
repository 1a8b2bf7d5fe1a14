use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::profile::{Profile, ProfilePatch},
    registry::AppRegistry,
};
use actix_web::{HttpResponse, web};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ProfileUpdateResponse {
    pub profile: Profile,
    /// True when the user will be signed out shortly
    pub logout_scheduled: bool,
}

fn guard(auth: &AuthUser) -> AppResult<()> {
    auth.require_capability("manage_users")?;
    auth.require_feature("admin")
}

#[utoipa::path(
    get,
    path = "/api/admin/profiles",
    responses(
        (status = 200, description = "Every profile", body = [Profile]),
        (status = 403, description = "Admin only")
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_profiles(
    auth: AuthUser,
    registry: web::Data<AppRegistry>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let profiles = registry.profile_store().list().await?;
    Ok(HttpResponse::Ok().json(profiles))
}

/// Changes role, access level or the active flag of a user.
///
/// The change reaches the user's open sessions through the permission
/// watcher; banning or deactivating signs them out after a short delay.
#[utoipa::path(
    put,
    path = "/api/admin/profiles/{user_id}",
    params(("user_id", Path, description = "User ID")),
    request_body = ProfilePatch,
    responses(
        (status = 200, description = "Profile updated", body = ProfileUpdateResponse),
        (status = 400, description = "Empty change or self lock-out"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    auth: AuthUser,
    registry: web::Data<AppRegistry>,
    path: web::Path<u64>,
    payload: web::Json<ProfilePatch>,
) -> AppResult<HttpResponse> {
    guard(&auth)?;
    let user_id = path.into_inner();

    if payload.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".to_string()));
    }
    if user_id == auth.user_id && payload.locks_out_admin() {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin access".to_string(),
        ));
    }

    let (profile, logout) = registry
        .watcher()
        .update_profile(user_id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    info!(
        admin_id = auth.user_id,
        user_id,
        role = %profile.role,
        access_level = %profile.access_level,
        active = profile.is_active,
        "Profile changed by admin"
    );

    Ok(HttpResponse::Ok().json(ProfileUpdateResponse {
        profile,
        logout_scheduled: logout.is_some(),
    }))
}
