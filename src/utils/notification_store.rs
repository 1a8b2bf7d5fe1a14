use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: &str, title: &str, message: impl Into<String>) -> Self {
        Notification {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            title: title.to_string(),
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Per-user notification lists, newest first.
///
/// Each write is an atomic read-modify-write of the user's entry, so
/// concurrent pushes for the same user are all kept.
#[derive(Clone)]
pub struct NotificationStore {
    lists: Cache<u64, Arc<Vec<Notification>>>,
    per_user: usize,
}

impl NotificationStore {
    pub fn new(per_user: usize) -> Self {
        Self {
            lists: Cache::builder()
                .max_capacity(50_000) // users with pending notifications
                .time_to_idle(Duration::from_secs(30 * 86_400))
                .build(),
            per_user: per_user.max(1),
        }
    }

    pub async fn push(&self, user_id: u64, notification: Notification) {
        let per_user = self.per_user;
        self.lists
            .entry(user_id)
            .and_upsert_with(|existing| {
                let mut list = existing
                    .map(|entry| entry.into_value().as_ref().clone())
                    .unwrap_or_default();
                list.insert(0, notification);
                list.truncate(per_user);
                std::future::ready(Arc::new(list))
            })
            .await;
    }

    pub async fn list(&self, user_id: u64) -> Vec<Notification> {
        self.lists
            .get(&user_id)
            .await
            .map(|l| l.as_ref().clone())
            .unwrap_or_default()
    }

    pub async fn unread_count(&self, user_id: u64) -> usize {
        self.list(user_id).await.iter().filter(|n| !n.read).count()
    }

    /// Returns false when no notification with that id exists.
    pub async fn mark_read(&self, user_id: u64, notification_id: &str) -> bool {
        let result = self
            .lists
            .entry(user_id)
            .and_compute_with(|existing| {
                let op = match existing {
                    None => Op::Nop,
                    Some(entry) => {
                        let mut list = entry.into_value().as_ref().clone();
                        match list.iter_mut().find(|n| n.id == notification_id) {
                            Some(found) => {
                                found.read = true;
                                Op::Put(Arc::new(list))
                            }
                            None => Op::Nop,
                        }
                    }
                };
                std::future::ready(op)
            })
            .await;
        matches!(result, CompResult::ReplacedWith(_))
    }

    pub async fn clear(&self, user_id: u64) {
        self.lists.invalidate(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_are_scoped_by_user_and_bounded() {
        let store = NotificationStore::new(2);
        store.push(1, Notification::new("info", "a", "first")).await;
        store.push(1, Notification::new("info", "b", "second")).await;
        store.push(1, Notification::new("info", "c", "third")).await;
        store.push(2, Notification::new("info", "x", "other user")).await;

        let list = store.list(1).await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].message, "third");
        assert_eq!(list[1].message, "second");
        assert_eq!(store.list(2).await.len(), 1);
    }

    #[tokio::test]
    async fn mark_read_and_clear() {
        let store = NotificationStore::new(10);
        let n = Notification::new("permission", "Access changed", "restricted");
        let id = n.id.clone();
        store.push(7, n).await;
        assert_eq!(store.unread_count(7).await, 1);

        assert!(store.mark_read(7, &id).await);
        assert!(!store.mark_read(7, "missing").await);
        assert_eq!(store.unread_count(7).await, 0);

        store.clear(7).await;
        assert!(store.list(7).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pushes_are_all_kept() {
        let store = NotificationStore::new(100);
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .push(3, Notification::new("info", "stock", format!("event {i}")))
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.list(3).await.len(), 50);
        assert_eq!(store.unread_count(3).await, 50);
    }
}
