use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::error::AppResult;
use crate::model::profile::{NewProfile, Profile, ProfilePatch, ProfileRow};
use crate::model::role::AccessLevel;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` means the profile does not exist; every `Err` is a failed lookup.
    async fn find_by_user_id(&self, user_id: u64) -> AppResult<Option<Profile>>;
    /// Fails with `AppError::Conflict` when the profile already exists.
    async fn insert(&self, profile: NewProfile) -> AppResult<()>;
    /// Returns the stored row after the change, `None` if no profile matched.
    async fn update(&self, user_id: u64, patch: &ProfilePatch) -> AppResult<Option<Profile>>;
    async fn list(&self) -> AppResult<Vec<Profile>>;
}

const PROFILE_COLUMNS: &str =
    "user_id, email, full_name, role, access_level, is_active, created_at, updated_at";

pub struct MySqlProfileStore {
    pool: MySqlPool,
}

impl MySqlProfileStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for MySqlProfileStore {
    async fn find_by_user_id(&self, user_id: u64) -> AppResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Profile::try_from).transpose()
    }

    async fn insert(&self, profile: NewProfile) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, email, role, access_level, is_active)
            VALUES (?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.email)
        .bind(profile.role.as_ref())
        .bind(AccessLevel::Full.as_ref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, user_id: u64, patch: &ProfilePatch) -> AppResult<Option<Profile>> {
        sqlx::query(
            r#"
            UPDATE profiles
            SET role = COALESCE(?, role),
                access_level = COALESCE(?, access_level),
                is_active = COALESCE(?, is_active),
                full_name = COALESCE(?, full_name),
                updated_at = NOW()
            WHERE user_id = ?
            "#,
        )
        .bind(patch.role.map(|r| r.as_ref().to_string()))
        .bind(patch.access_level.map(|l| l.as_ref().to_string()))
        .bind(patch.is_active)
        .bind(patch.full_name.as_deref())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        self.find_by_user_id(user_id).await
    }

    async fn list(&self) -> AppResult<Vec<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, ProfileRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Profile::try_from).collect()
    }
}
