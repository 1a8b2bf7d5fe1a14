use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::role::{AccessLevel, Role};

/// Application-level user record carrying role and access level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub user_id: u64,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub access_level: AccessLevel,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProfileRow {
    pub user_id: u64,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub access_level: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role)
            .map_err(|_| AppError::Internal(format!("unknown role '{}'", row.role)))?;
        let access_level = AccessLevel::from_str(&row.access_level).map_err(|_| {
            AppError::Internal(format!("unknown access level '{}'", row.access_level))
        })?;
        Ok(Profile {
            user_id: row.user_id,
            email: row.email,
            full_name: row.full_name,
            role,
            access_level,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Values used when a profile is created on first login.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

/// Admin panel changes to a profile. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfilePatch {
    pub role: Option<Role>,
    pub access_level: Option<AccessLevel>,
    pub is_active: Option<bool>,
    pub full_name: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.access_level.is_none()
            && self.is_active.is_none()
            && self.full_name.is_none()
    }

    /// Whether applying this patch to an admin's own profile would remove
    /// their admin rights or sign them out.
    pub fn locks_out_admin(&self) -> bool {
        self.role.is_some_and(|r| r != Role::Admin)
            || self.access_level.is_some_and(|l| l != AccessLevel::Full)
            || self.is_active == Some(false)
    }

    pub fn apply(&self, profile: &mut Profile) {
        if let Some(role) = self.role {
            profile.role = role;
        }
        if let Some(level) = self.access_level {
            profile.access_level = level;
        }
        if let Some(active) = self.is_active {
            profile.is_active = active;
        }
        if let Some(name) = &self.full_name {
            profile.full_name = Some(name.clone());
        }
        profile.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotion_and_deactivation_lock_out() {
        let demote = ProfilePatch {
            role: Some(Role::User),
            ..Default::default()
        };
        let deactivate = ProfilePatch {
            is_active: Some(false),
            ..Default::default()
        };
        let rename = ProfilePatch {
            full_name: Some("Ana".into()),
            ..Default::default()
        };
        assert!(demote.locks_out_admin());
        assert!(deactivate.locks_out_admin());
        assert!(!rename.locks_out_admin());
    }

    #[test]
    fn row_with_unknown_role_is_rejected() {
        let row = ProfileRow {
            user_id: 1,
            email: "a@b.c".into(),
            full_name: None,
            role: "owner".into(),
            access_level: "full".into(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(Profile::try_from(row).is_err());
    }
}
