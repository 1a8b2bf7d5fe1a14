//! Session bootstrap: from an authenticated identity to a ready profile.
//!
//! States:
//!
//! ```text
//! Unauthenticated -> Authenticating -> Ready
//!                                   -> ProfilePending (profile missing after retries)
//!                                   -> Error          (identity itself unusable)
//! ```
//!
//! `ProfilePending` is a loading state, not a failure: the user is signed in
//! but the profile row could not be produced yet.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::profile::{NewProfile, Profile};
use crate::model::role::Role;
use crate::model::user::SessionUser;
use crate::permissions::PermissionSnapshot;
use crate::realtime::bus::{BusEvent, EventBus};
use crate::realtime::watcher::PermissionWatcher;
use crate::repository::ProfileStore;
use crate::utils::retry::RetryPolicy;

/// Upper bound on one bootstrap before it reports `ProfilePending`.
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    ProfilePending,
    Ready,
    Error,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub user: Option<SessionUser>,
    pub profile: Option<Profile>,
    pub permissions: Option<PermissionSnapshot>,
}

impl SessionSnapshot {
    pub fn unauthenticated() -> Self {
        SessionSnapshot {
            state: SessionState::Unauthenticated,
            user: None,
            profile: None,
            permissions: None,
        }
    }

    pub fn error(user: Option<SessionUser>) -> Self {
        SessionSnapshot {
            state: SessionState::Error,
            user,
            profile: None,
            permissions: None,
        }
    }

    fn pending(user: SessionUser) -> Self {
        SessionSnapshot {
            state: SessionState::ProfilePending,
            user: Some(user),
            profile: None,
            permissions: None,
        }
    }

    fn ready(user: SessionUser, profile: Profile) -> Self {
        SessionSnapshot {
            state: SessionState::Ready,
            permissions: Some(PermissionSnapshot::from(&profile)),
            user: Some(user),
            profile: Some(profile),
        }
    }
}

/// Role assigned to a freshly provisioned profile.
pub fn role_for_email(email: &str, admin_email: &str) -> Role {
    if !admin_email.trim().is_empty() && email.trim().eq_ignore_ascii_case(admin_email.trim()) {
        Role::Admin
    } else {
        Role::User
    }
}

async fn fetch_or_create(
    store: &dyn ProfileStore,
    user: &SessionUser,
    admin_email: &str,
) -> AppResult<Profile> {
    if let Some(profile) = store.find_by_user_id(user.id).await? {
        return Ok(profile);
    }

    let new_profile = NewProfile {
        user_id: user.id,
        email: user.email.clone(),
        role: role_for_email(&user.email, admin_email),
    };
    debug!(user_id = user.id, role = %new_profile.role, "Creating profile");

    match store.insert(new_profile).await {
        Ok(()) => {}
        // created concurrently by another request
        Err(e) if e.is_duplicate() => {
            debug!(user_id = user.id, "Profile already exists, refetching");
        }
        Err(e) => return Err(e),
    }

    store
        .find_by_user_id(user.id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("profile for user {} missing after insert", user.id)))
}

/// Returns the user's profile, creating it on first login.
///
/// A missing row is only ever signalled by `Ok(None)` from the store; any
/// `Err` is treated as transient and retried under `policy`.
pub async fn ensure_profile(
    store: &dyn ProfileStore,
    user: &SessionUser,
    policy: &RetryPolicy,
    admin_email: &str,
) -> AppResult<Profile> {
    policy
        .run(move |attempt| async move {
            debug!(user_id = user.id, attempt, "Ensuring profile");
            fetch_or_create(store, user, admin_email).await
        })
        .await
}

#[derive(Clone)]
pub struct SessionBootstrap {
    store: Arc<dyn ProfileStore>,
    watcher: PermissionWatcher,
    bus: EventBus,
    policy: RetryPolicy,
    admin_email: String,
    timeout: Duration,
}

impl SessionBootstrap {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        watcher: PermissionWatcher,
        bus: EventBus,
        policy: RetryPolicy,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            watcher,
            bus,
            policy,
            admin_email: admin_email.into(),
            timeout: DEFAULT_BOOTSTRAP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[instrument(name = "session_bootstrap", skip(self, user), fields(user_id = user.as_ref().map(|u| u.id)))]
    pub async fn bootstrap(&self, user: Option<SessionUser>) -> SessionSnapshot {
        let Some(user) = user else {
            return SessionSnapshot::unauthenticated();
        };

        self.bus.publish(BusEvent::SessionChanged {
            user_id: user.id,
            state: SessionState::Authenticating,
        });

        let outcome = tokio::time::timeout(
            self.timeout,
            ensure_profile(self.store.as_ref(), &user, &self.policy, &self.admin_email),
        )
        .await;

        let snapshot = match outcome {
            Ok(Ok(profile)) => {
                self.watcher.remember(&profile).await;
                info!(user_id = user.id, role = %profile.role, "Session ready");
                SessionSnapshot::ready(user, profile)
            }
            Ok(Err(e)) => {
                error!(error = %e, user_id = user.id, "Profile unavailable after retries");
                SessionSnapshot::pending(user)
            }
            Err(_) => {
                warn!(user_id = user.id, timeout_ms = self.timeout.as_millis() as u64, "Profile bootstrap timed out");
                SessionSnapshot::pending(user)
            }
        };

        if let Some(user) = &snapshot.user {
            self.bus.publish(BusEvent::SessionChanged {
                user_id: user.id,
                state: snapshot.state,
            });
        }
        snapshot
    }

    /// Publishes the sign-out so listeners drop their local state.
    pub fn signed_out(&self, user_id: u64) {
        self.bus.publish(BusEvent::SessionChanged {
            user_id,
            state: SessionState::Unauthenticated,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_email_match_is_case_insensitive() {
        assert_eq!(role_for_email("Owner@Salon.Test ", "owner@salon.test"), Role::Admin);
        assert_eq!(role_for_email("guest@salon.test", "owner@salon.test"), Role::User);
    }

    #[test]
    fn empty_admin_email_never_matches() {
        assert_eq!(role_for_email("", ""), Role::User);
    }
}
