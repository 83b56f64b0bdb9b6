use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use herald_db::{NotificationFilter, NotificationPatch, NotificationStore, SortOrder, bounded};
use herald_types::error::{NotificationError, NotificationResult};

/// Owns the read flag. Reads only move false to true.
pub struct ReadStateManager {
    store: Arc<dyn NotificationStore>,
    timeout: Option<Duration>,
}

impl ReadStateManager {
    pub fn new(store: Arc<dyn NotificationStore>, timeout: Option<Duration>) -> Self {
        Self { store, timeout }
    }

    /// Idempotent: marking an already-read notification keeps its `read_at`.
    pub async fn mark_read(&self, id: Uuid) -> NotificationResult<()> {
        let patch = NotificationPatch {
            read_at: Some(Utc::now()),
            ..Default::default()
        };

        if bounded(self.timeout, self.store.update(id, patch)).await? {
            debug!("Marked notification {} read", id);
        }
        Ok(())
    }

    /// Mark every currently unread notification of `recipient_id` read and
    /// return how many transitioned.
    ///
    /// This takes a snapshot of the unread set and then marks each entry.
    /// Notifications created while it runs may be left unread; it is not a
    /// transactional barrier against concurrent creates.
    pub async fn mark_all_read(&self, recipient_id: &str) -> NotificationResult<u64> {
        let unread = bounded(
            self.timeout,
            self.store.query(
                NotificationFilter::recipient(recipient_id).unread(),
                SortOrder::NewestFirst,
                None,
            ),
        )
        .await?;

        let now = Utc::now();
        let mut marked = 0;
        for notification in unread {
            let patch = NotificationPatch {
                read_at: Some(now),
                ..Default::default()
            };
            match bounded(self.timeout, self.store.update(notification.id, patch)).await {
                Ok(true) => marked += 1,
                Ok(false) => {}
                // Deleted since the snapshot
                Err(NotificationError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!("Marked {} notifications read for {}", marked, recipient_id);
        Ok(marked)
    }

    pub async fn delete(&self, id: Uuid) -> NotificationResult<()> {
        bounded(self.timeout, self.store.delete(id)).await?;
        info!("Deleted notification {}", id);
        Ok(())
    }
}
