mod common;

use common::profile;
use salon::model::profile::Profile;
use salon::model::role::{AccessLevel, Role};
use salon::permissions::{self, PermissionSnapshot};

const NONE: Option<&Profile> = None;

fn snapshot(role: Role, access_level: AccessLevel, is_active: bool) -> PermissionSnapshot {
    PermissionSnapshot {
        role,
        access_level,
        is_active,
    }
}

#[test]
fn feature_table_by_access_level() {
    for feature in ["dashboard", "customers", "services", "alerts", "notifications", "settings"] {
        assert!(permissions::can_access(AccessLevel::Full, feature), "{feature}");
        assert!(permissions::can_access(AccessLevel::Restricted, feature), "{feature}");
        assert!(!permissions::can_access(AccessLevel::Banned, feature), "{feature}");
    }
    for feature in ["inventory", "workers", "payroll", "expenses", "analytics", "export", "admin"] {
        assert!(permissions::can_access(AccessLevel::Full, feature), "{feature}");
        assert!(!permissions::can_access(AccessLevel::Restricted, feature), "{feature}");
        assert!(!permissions::can_access(AccessLevel::Banned, feature), "{feature}");
    }
}

#[test]
fn unknown_feature_needs_full_access() {
    assert!(permissions::can_access(AccessLevel::Full, "loyalty"));
    assert!(!permissions::can_access(AccessLevel::Restricted, "loyalty"));
    assert!(!permissions::role_allows(Role::User, "refund_payments"));
    assert!(permissions::role_allows(Role::Admin, "refund_payments"));
}

#[test]
fn missing_profile_has_no_permissions() {
    assert!(!permissions::is_admin(NONE));
    assert!(!permissions::has_full_access(NONE));
    assert!(!permissions::is_banned(NONE));
    assert!(!permissions::profile_can_access(NONE, "dashboard"));
    assert!(!permissions::can_manage_services(NONE));
    assert_eq!(permissions::role_label(NONE), "Guest");
    assert_eq!(permissions::access_level_label(NONE), "No access");
}

#[test]
fn admin_with_full_access_can_do_everything() {
    let admin = profile(1, Role::Admin, AccessLevel::Full, true);
    let admin = Some(&admin);
    assert!(permissions::is_admin(admin));
    assert!(permissions::has_full_access(admin));
    assert!(permissions::can_manage_users(admin));
    assert!(permissions::can_manage_workers(admin));
    assert!(permissions::can_view_analytics(admin));
    assert!(permissions::can_view_all_customers(admin));
    assert!(permissions::can_manage_inventory(admin));
    assert_eq!(permissions::role_label(admin), "Administrator");
    assert_eq!(permissions::access_level_label(admin), "Full access");
}

#[test]
fn restricted_staff_keep_front_desk_features() {
    let staff = snapshot(Role::User, AccessLevel::Restricted, true);
    let staff = Some(&staff);
    assert!(permissions::is_restricted(staff));
    assert!(!permissions::has_full_access(staff));
    assert!(permissions::can_manage_services(staff));
    assert!(permissions::can_manage_customers(staff));
    assert!(!permissions::can_manage_inventory(staff));
    assert!(!permissions::can_view_all_customers(staff));
    assert!(!permissions::can_view_analytics(staff));
    assert!(permissions::profile_can_access(staff, "services"));
    assert!(!permissions::profile_can_access(staff, "inventory"));
}

#[test]
fn restricted_admin_loses_full_access_features() {
    let admin = snapshot(Role::Admin, AccessLevel::Restricted, true);
    let admin = Some(&admin);
    assert!(permissions::is_admin(admin));
    assert!(!permissions::can_view_analytics(admin));
    assert!(!permissions::can_manage_inventory(admin));
    assert!(permissions::can_manage_users(admin));
}

#[test]
fn banned_or_inactive_blocks_everything() {
    let banned = snapshot(Role::Admin, AccessLevel::Banned, true);
    let inactive = snapshot(Role::User, AccessLevel::Full, false);

    for p in [Some(&banned), Some(&inactive)] {
        assert!(permissions::is_banned(p));
        assert!(!permissions::has_full_access(p));
        assert!(!permissions::profile_can_access(p, "dashboard"));
        assert!(!permissions::can_manage_services(p));
        assert!(!permissions::can_manage_users(p));
    }
    assert_eq!(permissions::access_level_label(Some(&banned)), "Banned");
    assert_eq!(permissions::access_level_label(Some(&inactive)), "Deactivated");
    assert_eq!(permissions::role_label(Some(&inactive)), "Staff");
}
