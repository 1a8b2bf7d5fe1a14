//! Pure permission predicates.
//!
//! Two static tables drive every check: one maps a feature to the access
//! levels allowed to reach it, the other maps a capability to the roles
//! allowed to exercise it. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::profile::Profile;
use crate::model::role::{AccessLevel, Role};

/// Features reachable per access level. Unknown features fall back to
/// [`DEFAULT_FEATURE_LEVELS`].
pub const FEATURE_ACCESS: &[(&str, &[AccessLevel])] = &[
    ("dashboard", &[AccessLevel::Full, AccessLevel::Restricted]),
    ("customers", &[AccessLevel::Full, AccessLevel::Restricted]),
    ("services", &[AccessLevel::Full, AccessLevel::Restricted]),
    ("alerts", &[AccessLevel::Full, AccessLevel::Restricted]),
    ("notifications", &[AccessLevel::Full, AccessLevel::Restricted]),
    ("settings", &[AccessLevel::Full, AccessLevel::Restricted]),
    ("inventory", &[AccessLevel::Full]),
    ("workers", &[AccessLevel::Full]),
    ("payroll", &[AccessLevel::Full]),
    ("expenses", &[AccessLevel::Full]),
    ("analytics", &[AccessLevel::Full]),
    ("export", &[AccessLevel::Full]),
    ("admin", &[AccessLevel::Full]),
];

pub const DEFAULT_FEATURE_LEVELS: &[AccessLevel] = &[AccessLevel::Full];

/// Capabilities per role. Unknown capabilities fall back to
/// [`DEFAULT_CAPABILITY_ROLES`].
pub const CAPABILITY_ROLES: &[(&str, &[Role])] = &[
    ("manage_services", &[Role::Admin, Role::User]),
    ("manage_customers", &[Role::Admin, Role::User]),
    ("manage_inventory", &[Role::Admin, Role::User]),
    ("view_all_customers", &[Role::Admin]),
    ("manage_workers", &[Role::Admin]),
    ("manage_expenses", &[Role::Admin]),
    ("view_analytics", &[Role::Admin]),
    ("manage_users", &[Role::Admin]),
];

pub const DEFAULT_CAPABILITY_ROLES: &[Role] = &[Role::Admin];

/// Anything that carries role, access level and the active flag.
pub trait HasPermissions {
    fn role(&self) -> Role;
    fn access_level(&self) -> AccessLevel;
    fn is_active(&self) -> bool;
}

/// In-memory permission state of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionSnapshot {
    pub role: Role,
    pub access_level: AccessLevel,
    pub is_active: bool,
}

impl HasPermissions for PermissionSnapshot {
    fn role(&self) -> Role {
        self.role
    }
    fn access_level(&self) -> AccessLevel {
        self.access_level
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl HasPermissions for Profile {
    fn role(&self) -> Role {
        self.role
    }
    fn access_level(&self) -> AccessLevel {
        self.access_level
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl From<&Profile> for PermissionSnapshot {
    fn from(profile: &Profile) -> Self {
        PermissionSnapshot {
            role: profile.role,
            access_level: profile.access_level,
            is_active: profile.is_active,
        }
    }
}

pub fn allowed_levels(feature: &str) -> &'static [AccessLevel] {
    FEATURE_ACCESS
        .iter()
        .find(|(name, _)| *name == feature)
        .map(|(_, levels)| *levels)
        .unwrap_or(DEFAULT_FEATURE_LEVELS)
}

pub fn allowed_roles(capability: &str) -> &'static [Role] {
    CAPABILITY_ROLES
        .iter()
        .find(|(name, _)| *name == capability)
        .map(|(_, roles)| *roles)
        .unwrap_or(DEFAULT_CAPABILITY_ROLES)
}

/// Membership test of `level` against the feature table.
pub fn can_access(level: AccessLevel, feature: &str) -> bool {
    allowed_levels(feature).contains(&level)
}

pub fn role_allows(role: Role, capability: &str) -> bool {
    allowed_roles(capability).contains(&role)
}

pub fn is_admin<P: HasPermissions>(profile: Option<&P>) -> bool {
    profile.is_some_and(|p| p.role() == Role::Admin)
}

pub fn has_full_access<P: HasPermissions>(profile: Option<&P>) -> bool {
    profile.is_some_and(|p| p.is_active() && p.access_level() == AccessLevel::Full)
}

pub fn is_restricted<P: HasPermissions>(profile: Option<&P>) -> bool {
    profile.is_some_and(|p| p.access_level() == AccessLevel::Restricted)
}

/// Banned level or a deactivated account.
pub fn is_banned<P: HasPermissions>(profile: Option<&P>) -> bool {
    profile.is_some_and(|p| !p.is_active() || p.access_level() == AccessLevel::Banned)
}

/// Feature check for a profile: must exist, not be banned, and its access
/// level must be allowed for the feature.
pub fn profile_can_access<P: HasPermissions>(profile: Option<&P>, feature: &str) -> bool {
    match profile {
        Some(p) if !is_banned(Some(p)) => can_access(p.access_level(), feature),
        _ => false,
    }
}

fn has_capability<P: HasPermissions>(profile: Option<&P>, capability: &str) -> bool {
    match profile {
        Some(p) if !is_banned(Some(p)) => role_allows(p.role(), capability),
        _ => false,
    }
}

pub fn can_manage_services<P: HasPermissions>(profile: Option<&P>) -> bool {
    has_capability(profile, "manage_services")
}

pub fn can_manage_customers<P: HasPermissions>(profile: Option<&P>) -> bool {
    has_capability(profile, "manage_customers")
}

pub fn can_view_all_customers<P: HasPermissions>(profile: Option<&P>) -> bool {
    has_capability(profile, "view_all_customers")
}

pub fn can_manage_inventory<P: HasPermissions>(profile: Option<&P>) -> bool {
    has_capability(profile, "manage_inventory") && profile_can_access(profile, "inventory")
}

pub fn can_manage_workers<P: HasPermissions>(profile: Option<&P>) -> bool {
    has_capability(profile, "manage_workers")
}

pub fn can_view_analytics<P: HasPermissions>(profile: Option<&P>) -> bool {
    has_capability(profile, "view_analytics") && profile_can_access(profile, "analytics")
}

pub fn can_manage_users<P: HasPermissions>(profile: Option<&P>) -> bool {
    has_capability(profile, "manage_users")
}

pub fn role_label<P: HasPermissions>(profile: Option<&P>) -> &'static str {
    match profile.map(|p| p.role()) {
        Some(Role::Admin) => "Administrator",
        Some(Role::User) => "Staff",
        None => "Guest",
    }
}

pub fn access_level_label<P: HasPermissions>(profile: Option<&P>) -> &'static str {
    match profile {
        None => "No access",
        Some(p) if !p.is_active() => "Deactivated",
        Some(p) => match p.access_level() {
            AccessLevel::Full => "Full access",
            AccessLevel::Restricted => "Restricted access",
            AccessLevel::Banned => "Banned",
        },
    }
}
