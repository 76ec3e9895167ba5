use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// A transient success message shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Holds notifications until their time-to-live runs out.
///
/// Expiry is handled by the cache; `active` also filters on `expires_at` so a
/// notification is never reported past its deadline even before eviction runs.
#[derive(Clone)]
pub struct Notifier {
    entries: Cache<Uuid, Notification>,
    ttl: Duration,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(1_000)
            .build();
        Self { entries, ttl }
    }

    /// Publishes a notification that disappears after the configured duration.
    pub async fn push(&self, text: impl Into<String>) -> Notification {
        let created_at = Utc::now();
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let notification = Notification {
            id: Uuid::new_v4(),
            text: text.into(),
            created_at,
            expires_at: created_at + chrono::Duration::milliseconds(ttl_ms),
        };

        tracing::info!("Notification: {}", notification.text);
        self.entries
            .insert(notification.id, notification.clone())
            .await;
        notification
    }

    /// Notifications that have not expired yet, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let now = Utc::now();
        let mut active: Vec<Notification> = self
            .entries
            .iter()
            .map(|(_, notification)| notification)
            .filter(|notification| !notification.is_expired_at(now))
            .collect();
        active.sort_by_key(|notification| notification.created_at);
        active
    }

    /// Removes a notification before it expires. Returns it if it was still held.
    pub async fn dismiss(&self, id: Uuid) -> Option<Notification> {
        self.entries.remove(&id).await
    }
}
