mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

use common::{FakeProfileStore, FakeRevoker, profile, user};
use salon::auth::session::{SessionBootstrap, SessionState, ensure_profile};
use salon::model::role::{AccessLevel, Role};
use salon::realtime::{BusEvent, EventBus, PermissionWatcher};
use salon::utils::notification_store::NotificationStore;
use salon::utils::retry::RetryPolicy;

const ADMIN: &str = "owner@salon.test";

fn bootstrap_for(store: Arc<FakeProfileStore>, bus: EventBus) -> SessionBootstrap {
    let watcher = PermissionWatcher::new(
        store.clone(),
        Arc::new(FakeRevoker::default()),
        bus.clone(),
        NotificationStore::new(10),
        Duration::from_secs(2),
    );
    SessionBootstrap::new(store, watcher, bus, RetryPolicy::default(), ADMIN)
}

#[tokio::test]
async fn no_user_is_unauthenticated() {
    let store = Arc::new(FakeProfileStore::default());
    let snapshot = bootstrap_for(store, EventBus::default()).bootstrap(None).await;
    assert_eq!(snapshot.state, SessionState::Unauthenticated);
    assert!(snapshot.profile.is_none());
}

#[tokio::test]
async fn first_login_provisions_role_from_email() {
    let store = Arc::new(FakeProfileStore::default());
    let bootstrap = bootstrap_for(store.clone(), EventBus::default());

    let admin = bootstrap.bootstrap(Some(user(1, "Owner@Salon.test"))).await;
    assert_eq!(admin.state, SessionState::Ready);
    assert_eq!(admin.profile.as_ref().map(|p| p.role), Some(Role::Admin));

    let staff = bootstrap.bootstrap(Some(user(2, "sam@salon.test"))).await;
    assert_eq!(staff.state, SessionState::Ready);
    let staff_profile = staff.profile.unwrap();
    assert_eq!(staff_profile.role, Role::User);
    assert_eq!(staff_profile.access_level, AccessLevel::Full);
    assert!(staff_profile.is_active);

    assert_eq!(store.inserts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn existing_profile_is_not_recreated() {
    let store = Arc::new(FakeProfileStore::with_profile(profile(
        5,
        Role::User,
        AccessLevel::Restricted,
        true,
    )));
    // the stored role wins over the admin email
    let snapshot = bootstrap_for(store.clone(), EventBus::default())
        .bootstrap(Some(user(5, ADMIN)))
        .await;

    assert_eq!(snapshot.state, SessionState::Ready);
    let permissions = snapshot.permissions.unwrap();
    assert_eq!(permissions.role, Role::User);
    assert_eq!(permissions.access_level, AccessLevel::Restricted);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicate_insert_refetches_the_winner() {
    let store = Arc::new(FakeProfileStore::default());
    store.race_on_insert();

    let snapshot = bootstrap_for(store.clone(), EventBus::default())
        .bootstrap(Some(user(3, "sam@salon.test")))
        .await;

    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.profile.unwrap().user_id, 3);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_backoff() {
    let store = Arc::new(FakeProfileStore::default());
    store.fail_next(2);

    let start = Instant::now();
    let snapshot = bootstrap_for(store.clone(), EventBus::default())
        .bootstrap(Some(user(7, "sam@salon.test")))
        .await;

    assert_eq!(snapshot.state, SessionState::Ready);
    // 1s after the first failure, 2s after the second
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    // two failed lookups, then lookup, insert, lookup
    assert_eq!(store.lookups.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_leave_the_profile_pending() {
    let store = Arc::new(FakeProfileStore::default());
    store.fail_next(100);

    let start = Instant::now();
    let snapshot = bootstrap_for(store.clone(), EventBus::default())
        .bootstrap(Some(user(8, "sam@salon.test")))
        .await;

    assert_eq!(snapshot.state, SessionState::ProfilePending);
    assert_eq!(snapshot.user.map(|u| u.id), Some(8));
    assert!(snapshot.profile.is_none());
    assert_eq!(store.lookups.load(Ordering::SeqCst), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_capped() {
    let store = FakeProfileStore::default();
    store.fail_next(4);
    let policy = RetryPolicy::new(5, Duration::from_millis(1000), Duration::from_millis(5000));

    let start = Instant::now();
    let profile = ensure_profile(&store, &user(9, "sam@salon.test"), &policy, ADMIN)
        .await
        .unwrap();

    assert_eq!(profile.user_id, 9);
    // 1s + 2s + 4s + 5s (capped)
    assert_eq!(start.elapsed(), Duration::from_secs(12));
}

#[tokio::test]
async fn bootstrap_publishes_session_transitions() {
    let store = Arc::new(FakeProfileStore::default());
    let bus = EventBus::default();
    let mut rx = bus.subscribe();

    bootstrap_for(store, bus)
        .bootstrap(Some(user(11, "sam@salon.test")))
        .await;

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BusEvent::SessionChanged { user_id, state } = event {
            assert_eq!(user_id, 11);
            states.push(state);
        }
    }
    assert_eq!(states, vec![SessionState::Authenticating, SessionState::Ready]);
}

#[tokio::test(start_paused = true)]
async fn failed_insert_is_not_mistaken_for_a_concurrent_create() {
    let store = Arc::new(FakeProfileStore::default());
    store.reject_inserts();

    let snapshot = bootstrap_for(store.clone(), EventBus::default())
        .bootstrap(Some(user(12, "gone@salon.test")))
        .await;

    assert_eq!(snapshot.state, SessionState::ProfilePending);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 3);
    // one lookup per attempt, never a refetch after the failed insert
    assert_eq!(store.lookups.load(Ordering::SeqCst), 3);
}
