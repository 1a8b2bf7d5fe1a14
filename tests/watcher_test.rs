mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use common::{FakeProfileStore, FakeRevoker, profile};
use salon::model::profile::ProfilePatch;
use salon::model::role::{AccessLevel, Role};
use salon::permissions::PermissionSnapshot;
use salon::realtime::{BusEvent, EventBus, PermissionWatcher};
use salon::utils::notification_store::NotificationStore;

struct Harness {
    store: Arc<FakeProfileStore>,
    revoker: Arc<FakeRevoker>,
    bus: EventBus,
    notifications: NotificationStore,
    watcher: PermissionWatcher,
}

fn harness() -> Harness {
    let store = Arc::new(FakeProfileStore::with_profile(profile(
        42,
        Role::User,
        AccessLevel::Full,
        true,
    )));
    let revoker = Arc::new(FakeRevoker::default());
    let bus = EventBus::new(32);
    let notifications = NotificationStore::new(10);
    let watcher = PermissionWatcher::new(
        store.clone(),
        revoker.clone(),
        bus.clone(),
        notifications.clone(),
        Duration::from_secs(2),
    );
    Harness {
        store,
        revoker,
        bus,
        notifications,
        watcher,
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<BusEvent>) -> Vec<BusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn load_caches_the_snapshot() {
    let h = harness();
    assert!(h.watcher.current(42).await.is_none());

    let loaded = h.watcher.load(42).await.unwrap().unwrap();
    assert_eq!(loaded.access_level, AccessLevel::Full);
    assert_eq!(h.watcher.current(42).await, Some(loaded));
    assert!(h.watcher.load(7).await.unwrap().is_none());
}

#[tokio::test]
async fn restriction_propagates_without_logout() {
    let h = harness();
    let mut rx = h.bus.subscribe();

    let patch = ProfilePatch {
        access_level: Some(AccessLevel::Restricted),
        ..Default::default()
    };
    let (updated, logout) = h.watcher.update_profile(42, &patch).await.unwrap().unwrap();

    assert_eq!(updated.access_level, AccessLevel::Restricted);
    assert!(logout.is_none());
    assert_eq!(
        h.watcher.current(42).await,
        Some(PermissionSnapshot {
            role: Role::User,
            access_level: AccessLevel::Restricted,
            is_active: true,
        })
    );

    let names: Vec<_> = drain(&mut rx).iter().map(BusEvent::name).collect();
    assert_eq!(names, vec!["userPermissionChanged", "profileUpdated"]);
    assert_eq!(h.notifications.unread_count(42).await, 1);
}

#[tokio::test(start_paused = true)]
async fn ban_forces_logout_after_delay() {
    let h = harness();
    let mut rx = h.bus.subscribe();

    let patch = ProfilePatch {
        access_level: Some(AccessLevel::Banned),
        ..Default::default()
    };
    let start = Instant::now();
    let (_, logout) = h.watcher.update_profile(42, &patch).await.unwrap().unwrap();
    let logout = logout.expect("ban schedules a logout");

    tokio::task::yield_now().await;
    assert!(h.revoker.revoked().is_empty());

    logout.await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!(h.revoker.revoked(), vec![42]);

    let events = drain(&mut rx);
    let Some(BusEvent::ForceLogout { user_id, reason }) = events.last() else {
        panic!("expected a forced logout, got {events:?}");
    };
    assert_eq!(*user_id, 42);
    assert_eq!(reason, "Account banned");

    let notes = h.notifications.list(42).await;
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.contains("banned"));
}

#[tokio::test(start_paused = true)]
async fn deactivation_also_forces_logout() {
    let h = harness();
    let patch = ProfilePatch {
        is_active: Some(false),
        ..Default::default()
    };
    let (_, logout) = h.watcher.update_profile(42, &patch).await.unwrap().unwrap();
    logout.expect("deactivation schedules a logout").await.unwrap();

    assert_eq!(h.revoker.revoked(), vec![42]);
    assert!(!h.store.get(42).unwrap().is_active);
}

#[tokio::test]
async fn unchanged_permissions_do_not_notify() {
    let h = harness();
    h.watcher.load(42).await.unwrap();

    let patch = ProfilePatch {
        full_name: Some("Robin".to_string()),
        ..Default::default()
    };
    let (updated, logout) = h.watcher.update_profile(42, &patch).await.unwrap().unwrap();

    assert_eq!(updated.full_name.as_deref(), Some("Robin"));
    assert!(logout.is_none());
    assert_eq!(h.notifications.unread_count(42).await, 0);
}

#[tokio::test]
async fn missing_profile_is_reported() {
    let h = harness();
    let patch = ProfilePatch {
        role: Some(Role::Admin),
        ..Default::default()
    };
    assert!(h.watcher.update_profile(99, &patch).await.unwrap().is_none());
}
