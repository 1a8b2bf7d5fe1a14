use serde::Serialize;
use tokio::sync::broadcast;

use crate::auth::session::SessionState;
use crate::model::profile::Profile;
use crate::permissions::PermissionSnapshot;

/// Change notifications shared between independent parts of the service.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    UserPermissionChanged {
        user_id: u64,
        permissions: PermissionSnapshot,
    },
    ProfileUpdated {
        user_id: u64,
        profile: Profile,
    },
    ForceLogout {
        user_id: u64,
        reason: String,
    },
    InventoryDataChanged {
        service_id: Option<u64>,
        item_ids: Vec<u64>,
    },
    SessionChanged {
        user_id: u64,
        state: SessionState,
    },
}

impl BusEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::UserPermissionChanged { .. } => "userPermissionChanged",
            BusEvent::ProfileUpdated { .. } => "profileUpdated",
            BusEvent::ForceLogout { .. } => "forceLogout",
            BusEvent::InventoryDataChanged { .. } => "inventory-data-changed",
            BusEvent::SessionChanged { .. } => "sessionChanged",
        }
    }

    /// `None` for events every subscriber receives.
    pub fn user_id(&self) -> Option<u64> {
        match self {
            BusEvent::UserPermissionChanged { user_id, .. }
            | BusEvent::ProfileUpdated { user_id, .. }
            | BusEvent::ForceLogout { user_id, .. }
            | BusEvent::SessionChanged { user_id, .. } => Some(*user_id),
            BusEvent::InventoryDataChanged { .. } => None,
        }
    }

    pub fn is_for(&self, user_id: u64) -> bool {
        self.user_id().is_none_or(|target| target == user_id)
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: BusEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(event = name, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_events_reach_everyone() {
        let event = BusEvent::InventoryDataChanged {
            service_id: Some(1),
            item_ids: vec![2],
        };
        assert!(event.is_for(10));
        assert!(event.is_for(11));
    }

    #[test]
    fn user_events_are_addressed() {
        let event = BusEvent::ForceLogout {
            user_id: 10,
            reason: "banned".into(),
        };
        assert!(event.is_for(10));
        assert!(!event.is_for(11));
        assert_eq!(event.name(), "forceLogout");
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(
            bus.publish(BusEvent::InventoryDataChanged {
                service_id: None,
                item_ids: vec![]
            }),
            1
        );
        let got = rx.recv().await.unwrap();
        assert_eq!(got.name(), "inventory-data-changed");
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new(8);
        assert_eq!(
            bus.publish(BusEvent::ForceLogout {
                user_id: 1,
                reason: "x".into()
            }),
            0
        );
    }
}
