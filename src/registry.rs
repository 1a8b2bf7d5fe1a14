use std::sync::Arc;

use sqlx::MySqlPool;

use crate::auth::session::SessionBootstrap;
use crate::completion::CompletionWorkflow;
use crate::config::Config;
use crate::realtime::{EventBus, PermissionWatcher};
use crate::repository::{
    InventoryGateway, MySqlInventoryGateway, MySqlProfileStore, MySqlSessionRevoker, ProfileStore,
    SessionRevoker,
};
use crate::utils::notification_store::NotificationStore;

/// Shared services handed to every handler through `web::Data`.
#[derive(Clone)]
pub struct AppRegistry {
    profile_store: Arc<dyn ProfileStore>,
    bus: EventBus,
    notifications: NotificationStore,
    watcher: PermissionWatcher,
    bootstrap: SessionBootstrap,
    completion: CompletionWorkflow,
}

impl AppRegistry {
    pub fn new(pool: MySqlPool, config: &Config) -> Self {
        Self::from_parts(
            Arc::new(MySqlProfileStore::new(pool.clone())),
            Arc::new(MySqlSessionRevoker::new(pool.clone())),
            Arc::new(MySqlInventoryGateway::new(pool)),
            config,
        )
    }

    pub fn from_parts(
        profile_store: Arc<dyn ProfileStore>,
        revoker: Arc<dyn SessionRevoker>,
        gateway: Arc<dyn InventoryGateway>,
        config: &Config,
    ) -> Self {
        let bus = EventBus::default();
        let notifications = NotificationStore::new(config.notification_capacity);
        let watcher = PermissionWatcher::new(
            profile_store.clone(),
            revoker,
            bus.clone(),
            notifications.clone(),
            config.forced_logout_delay,
        );
        let bootstrap = SessionBootstrap::new(
            profile_store.clone(),
            watcher.clone(),
            bus.clone(),
            config.profile_retry,
            config.admin_email.clone(),
        );
        let completion = CompletionWorkflow::new(gateway, bus.clone());

        Self {
            profile_store,
            bus,
            notifications,
            watcher,
            bootstrap,
            completion,
        }
    }

    pub fn profile_store(&self) -> Arc<dyn ProfileStore> {
        self.profile_store.clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    pub fn watcher(&self) -> &PermissionWatcher {
        &self.watcher
    }

    pub fn bootstrap(&self) -> &SessionBootstrap {
        &self.bootstrap
    }

    pub fn completion(&self) -> &CompletionWorkflow {
        &self.completion
    }
}
