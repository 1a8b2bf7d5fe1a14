use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
        session::{SessionSnapshot, SessionState},
    },
    config::Config,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        role::Role,
        user::{SessionUser, User},
    },
    models::{LoginReqDto, RegisterReqDto, TokenType},
    permissions,
    registry::AppRegistry,
    utils::email_filter,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
    session: SessionSnapshot,
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> bool {
    // cuckoo filter: a miss is definitive
    if !email_filter::might_exist(email) {
        return true;
    }

    // the filter may report false positives; the unique index decides
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(email_filter::normalize(email))
    .fetch_one(pool)
    .await
    .unwrap_or(true); // fail-safe

    !exists
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

async fn store_refresh_token(pool: &MySqlPool, user_id: u64, jti: &str, exp: usize) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

fn issue_tokens(user_id: u64, email: &str, role: Role, config: &Config) -> AppResult<(String, String, crate::models::Claims)> {
    let access_token = generate_access_token(
        user_id,
        email,
        role.id(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        email,
        role.id(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))?;

    Ok((access_token, refresh_token, refresh_claims))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReqDto,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing email or password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    user: web::Json<RegisterReqDto>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let email = email_filter::normalize(&user.email);

    if email.is_empty() || user.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password must not be empty".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("Email is not valid".to_string()));
    }

    if !is_email_available(&email, pool.get_ref()).await {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let result = sqlx::query("INSERT INTO users (email, password, full_name) VALUES (?, ?, ?)")
        .bind(&email)
        .bind(hashed)
        .bind(user.full_name.as_deref())
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            email_filter::insert(&email);
            info!(email = %email, "User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully"
            })))
        }
        Err(e) if is_duplicate_key(&e) => {
            Err(AppError::Conflict("Email already registered".to_string()))
        }
        Err(e) => {
            error!(error = %e, "Failed to register user");
            Err(e.into())
        }
    }
}

/// Verifies credentials, bootstraps the session and issues tokens.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, registry, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    registry: web::Data<AppRegistry>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::BadRequest("Email or password required".to_string()));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, User>("SELECT id, email, password FROM users WHERE email = ?")
        .bind(email_filter::normalize(&user.email))
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Database error while fetching user");
            AppError::from(e)
        })?
        .ok_or_else(|| {
            info!("Invalid credentials: user not found");
            AppError::Unauthorized("Invalid credentials".to_string())
        })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let session = registry
        .bootstrap()
        .bootstrap(Some(SessionUser::from(&db_user)))
        .await;

    if permissions::is_banned(session.profile.as_ref()) {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return Err(AppError::Forbidden("Account disabled".to_string()));
    }

    let role = session
        .profile
        .as_ref()
        .map(|p| p.role)
        .unwrap_or(Role::User);

    let (access_token, refresh_token, refresh_claims) =
        issue_tokens(db_user.id, &db_user.email, role, &config)?;

    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool.get_ref(), db_user.id, &refresh_claims.jti, refresh_claims.exp).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(state = ?session.state, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        session,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair"),
        (status = 401, description = "Refresh token invalid, revoked or expired"),
        (status = 403, description = "Account disabled")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    registry: web::Data<AppRegistry>,
) -> AppResult<HttpResponse> {
    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized("No token".to_string()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".to_string()));
    }

    let record = sqlx::query_as::<_, (u64, u64, bool)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await?;

    let (record_id, user_id) = match record {
        Some((id, user_id, false)) => (id, user_id),
        _ => return Err(AppError::Unauthorized("Refresh token revoked".to_string())),
    };

    let snapshot = registry.watcher().load(user_id).await?;
    if permissions::is_banned(snapshot.as_ref()) {
        return Err(AppError::Forbidden("Account disabled".to_string()));
    }
    let role = snapshot
        .map(|s| s.role)
        .or_else(|| Role::from_id(claims.role))
        .unwrap_or(Role::User);

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record_id)
        .execute(pool.get_ref())
        .await?;

    let (access_token, new_refresh_token, new_claims) =
        issue_tokens(user_id, &claims.sub, role, &config)?;
    store_refresh_token(pool.get_ref(), user_id, &new_claims.jti, new_claims.exp).await?;

    Ok(HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    })))
}

/// Sign out. Always 204, even for unknown tokens.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Signed out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    registry: web::Data<AppRegistry>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    registry.bootstrap().signed_out(claims.user_id);

    HttpResponse::NoContent().finish()
}

/// Current session, re-running the profile bootstrap if needed.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn session(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    registry: web::Data<AppRegistry>,
) -> AppResult<HttpResponse> {
    let user = sqlx::query_as::<_, User>("SELECT id, email, password FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?;

    let snapshot = match user {
        Some(user) => {
            registry
                .bootstrap()
                .bootstrap(Some(SessionUser::from(&user)))
                .await
        }
        None => {
            error!(user_id = auth.user_id, "Token refers to a missing user");
            SessionSnapshot::error(Some(SessionUser {
                id: auth.user_id,
                email: auth.email.clone(),
            }))
        }
    };

    debug!(state = ?snapshot.state, "Session requested");
    if snapshot.state == SessionState::Error {
        return Ok(HttpResponse::Unauthorized().json(snapshot));
    }
    Ok(HttpResponse::Ok().json(snapshot))
}
