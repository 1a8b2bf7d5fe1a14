use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;
use sqlx::error::ErrorKind;

use crate::utils::error_hints;

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "database error: {}", _0)]
    Database(String),
    #[display(fmt = "internal error: {}", _0)]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

impl std::error::Error for AppError {}

/// Unique-key violations only. MySQL shares SQLSTATE 23000 between
/// duplicate keys, foreign keys and NOT NULL, so the driver's kind is used.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Maps a constraint violation reported by the database.
pub fn constraint_error(kind: ErrorKind, message: String) -> AppError {
    match kind {
        ErrorKind::UniqueViolation => AppError::Conflict(message),
        ErrorKind::ForeignKeyViolation => {
            tracing::warn!(error = %message, "Foreign key violation");
            AppError::BadRequest("Referenced record is missing or still in use".to_string())
        }
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => AppError::BadRequest(message),
        _ => AppError::Database(message),
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                constraint_error(db_err.kind(), db_err.message().to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            // raw database text stays in the logs
            AppError::Database(msg) | AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                json!({
                    "error": self.kind(),
                    "message": "Internal Server Error",
                    "hint": error_hints::describe(msg),
                })
            }
            AppError::Conflict(msg) => json!({
                "error": self.kind(),
                "message": msg,
                "hint": error_hints::describe(msg),
            }),
            other => json!({
                "error": other.kind(),
                "message": other.to_string(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Database("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn only_unique_violations_are_duplicates() {
        let dup = constraint_error(
            ErrorKind::UniqueViolation,
            "Duplicate entry 'a@b.c' for key 'email'".into(),
        );
        assert!(dup.is_duplicate());

        let fk = constraint_error(
            ErrorKind::ForeignKeyViolation,
            "Cannot add or update a child row: a foreign key constraint fails".into(),
        );
        assert!(!fk.is_duplicate());
        assert_eq!(fk.status_code(), StatusCode::BAD_REQUEST);

        let not_null = constraint_error(ErrorKind::NotNullViolation, "Column 'name' cannot be null".into());
        assert!(!not_null.is_duplicate());

        assert!(matches!(
            constraint_error(ErrorKind::Other, "deadlock".into()),
            AppError::Database(_)
        ));
    }
}
