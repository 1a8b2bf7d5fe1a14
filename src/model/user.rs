use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Authentication identity. Distinct from [`crate::model::profile::Profile`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// The part of a user the session bootstrap needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionUser {
    pub id: u64,
    pub email: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            id: user.id,
            email: user.email.clone(),
        }
    }
}
