use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::error::AppResult;
use crate::model::profile::{Profile, ProfilePatch};
use crate::permissions::{self, PermissionSnapshot};
use crate::realtime::bus::{BusEvent, EventBus};
use crate::repository::{ProfileStore, SessionRevoker};
use crate::utils::notification_store::{Notification, NotificationStore};

/// Keeps each user's effective permissions current without a re-login.
///
/// Every profile write goes through [`PermissionWatcher::apply_update`],
/// which refreshes the cached snapshot, fans the change out on the bus and
/// schedules a sign-out when the account was banned or deactivated.
#[derive(Clone)]
pub struct PermissionWatcher {
    store: Arc<dyn ProfileStore>,
    revoker: Arc<dyn SessionRevoker>,
    bus: EventBus,
    notifications: NotificationStore,
    snapshots: Cache<u64, PermissionSnapshot>,
    logout_delay: Duration,
}

impl PermissionWatcher {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        revoker: Arc<dyn SessionRevoker>,
        bus: EventBus,
        notifications: NotificationStore,
        logout_delay: Duration,
    ) -> Self {
        Self {
            store,
            revoker,
            bus,
            notifications,
            snapshots: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(3600))
                .build(),
            logout_delay,
        }
    }

    pub fn logout_delay(&self) -> Duration {
        self.logout_delay
    }

    /// Cached snapshot, fetched from the profile store on a miss.
    pub async fn load(&self, user_id: u64) -> AppResult<Option<PermissionSnapshot>> {
        if let Some(snapshot) = self.snapshots.get(&user_id).await {
            return Ok(Some(snapshot));
        }
        let Some(profile) = self.store.find_by_user_id(user_id).await? else {
            return Ok(None);
        };
        let snapshot = PermissionSnapshot::from(&profile);
        self.snapshots.insert(user_id, snapshot).await;
        Ok(Some(snapshot))
    }

    pub async fn current(&self, user_id: u64) -> Option<PermissionSnapshot> {
        self.snapshots.get(&user_id).await
    }

    /// Seeds the cache without publishing anything.
    pub async fn remember(&self, profile: &Profile) {
        self.snapshots
            .insert(profile.user_id, PermissionSnapshot::from(profile))
            .await;
    }

    /// Writes a profile change and propagates it.
    #[instrument(name = "profile_update", skip(self, patch))]
    pub async fn update_profile(
        &self,
        user_id: u64,
        patch: &ProfilePatch,
    ) -> AppResult<Option<(Profile, Option<JoinHandle<()>>)>> {
        let Some(profile) = self.store.update(user_id, patch).await? else {
            return Ok(None);
        };
        let logout = self.apply_update(&profile).await;
        Ok(Some((profile, logout)))
    }

    /// Handles one profile-row change notification.
    ///
    /// Returns the handle of the scheduled sign-out when the new row is
    /// banned or inactive.
    pub async fn apply_update(&self, profile: &Profile) -> Option<JoinHandle<()>> {
        let user_id = profile.user_id;
        let previous = self.snapshots.get(&user_id).await;
        let snapshot = PermissionSnapshot::from(profile);
        self.snapshots.insert(user_id, snapshot).await;

        self.bus.publish(BusEvent::UserPermissionChanged {
            user_id,
            permissions: snapshot,
        });
        self.bus.publish(BusEvent::ProfileUpdated {
            user_id,
            profile: profile.clone(),
        });

        if previous != Some(snapshot) {
            let message = format!(
                "Your account is now {} ({})",
                permissions::access_level_label(Some(&snapshot)).to_lowercase(),
                permissions::role_label(Some(&snapshot)).to_lowercase(),
            );
            self.notifications
                .push(user_id, Notification::new("permission", "Permissions updated", message))
                .await;
        }

        if permissions::is_banned(Some(&snapshot)) {
            let reason = if snapshot.is_active {
                "Account banned"
            } else {
                "Account deactivated"
            };
            return Some(self.schedule_forced_logout(user_id, reason));
        }
        None
    }

    /// Signs the user out after the configured delay so the notification
    /// can reach the client first.
    pub fn schedule_forced_logout(&self, user_id: u64, reason: &str) -> JoinHandle<()> {
        let revoker = self.revoker.clone();
        let bus = self.bus.clone();
        let delay = self.logout_delay;
        let reason = reason.to_string();

        info!(user_id, delay_ms = delay.as_millis() as u64, %reason, "Forced logout scheduled");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match revoker.revoke_all(user_id).await {
                Ok(revoked) => info!(user_id, revoked, "Sessions revoked"),
                Err(e) => error!(error = %e, user_id, "Failed to revoke sessions"),
            }
            bus.publish(BusEvent::ForceLogout { user_id, reason });
        })
    }
}
