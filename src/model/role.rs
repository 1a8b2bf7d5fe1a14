use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    User = 2,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::User),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Narrows feature availability independently of [`Role`].
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccessLevel {
    Full,
    Restricted,
    Banned,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_ids_round_trip() {
        assert_eq!(Role::from_id(Role::Admin.id()), Some(Role::Admin));
        assert_eq!(Role::from_id(Role::User.id()), Some(Role::User));
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn parses_stored_strings() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(AccessLevel::from_str("banned").unwrap(), AccessLevel::Banned);
        assert!(AccessLevel::from_str("superuser").is_err());
        assert_eq!(AccessLevel::Restricted.as_ref(), "restricted");
    }
}
