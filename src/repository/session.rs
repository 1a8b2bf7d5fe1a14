use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::error::AppResult;

/// Ends every session of a user.
#[async_trait]
pub trait SessionRevoker: Send + Sync {
    /// Returns how many refresh tokens were revoked.
    async fn revoke_all(&self, user_id: u64) -> AppResult<u64>;
}

pub struct MySqlSessionRevoker {
    pool: MySqlPool,
}

impl MySqlSessionRevoker {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRevoker for MySqlSessionRevoker {
    async fn revoke_all(&self, user_id: u64) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
