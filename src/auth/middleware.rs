use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use crate::permissions;
use crate::registry::AppRegistry;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn reject(req: ServiceRequest, resp: HttpResponse) -> Result<ServiceResponse<BoxBody>, Error> {
    Ok(req.into_response(resp.map_into_boxed_body()))
}

/// Verifies the bearer token and attaches the caller with live permissions.
///
/// Permissions come from the permission watcher rather than the token, so a
/// ban or role change applies to the next request.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;
    let registry = req
        .app_data::<Data<AppRegistry>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App registry missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => h.to_str().map_err(|_| {
            actix_web::error::ErrorUnauthorized(
                json!({"error": "Invalid Authorization header encoding"}),
            )
        })?,
        None => {
            let resp =
                HttpResponse::Unauthorized().json(json!({"error": "Missing Authorization header"}));
            return reject(req, resp);
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            let resp = HttpResponse::Unauthorized()
                .json(json!({"error": "Authorization header must start with Bearer"}));
            return reject(req, resp);
        }
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            let resp = HttpResponse::Unauthorized()
                .json(json!({"error": "Invalid or expired token", "details": e}));
            return reject(req, resp);
        }
    };

    if claims.token_type != TokenType::Access {
        let resp = HttpResponse::Unauthorized().json(json!({"error": "Access token required"}));
        return reject(req, resp);
    }

    let token_role = match Role::from_id(claims.role) {
        Some(role) => role,
        None => {
            let resp = HttpResponse::Unauthorized().json(json!({"error": "Invalid role"}));
            return reject(req, resp);
        }
    };

    let snapshot = match registry.watcher().load(claims.user_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(error = %e, user_id = claims.user_id, "Failed to load permissions");
            let resp = HttpResponse::ServiceUnavailable()
                .json(json!({"error": "Permissions unavailable, retry shortly"}));
            return reject(req, resp);
        }
    };

    if permissions::is_banned(snapshot.as_ref()) {
        let resp = HttpResponse::Forbidden()
            .json(json!({"error": "Account disabled", "force_logout": true}));
        return reject(req, resp);
    }

    // no profile yet: the session is still being prepared, fall back to the token
    let (role, access_level) = match snapshot {
        Some(s) => (s.role, s.access_level),
        None => (token_role, crate::model::role::AccessLevel::Restricted),
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role,
        access_level,
    });

    next.call(req).await
}
