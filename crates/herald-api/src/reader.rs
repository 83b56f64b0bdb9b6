use std::sync::Arc;
use std::time::Duration;

use herald_db::{NotificationFilter, NotificationStore, SortOrder, bounded};
use herald_types::error::NotificationResult;
use herald_types::models::{Notification, NotificationType};

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 1000;

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub unread_only: bool,
    /// `None` means every type.
    pub types: Option<Vec<NotificationType>>,
    pub limit: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            unread_only: false,
            types: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Point-in-time reads of a recipient's notifications. Never waits for new
/// data; an unknown recipient simply has none.
pub struct NotificationReader {
    store: Arc<dyn NotificationStore>,
    timeout: Option<Duration>,
}

impl NotificationReader {
    pub fn new(store: Arc<dyn NotificationStore>, timeout: Option<Duration>) -> Self {
        Self { store, timeout }
    }

    /// Newest first, at most `min(options.limit, MAX_LIST_LIMIT)` records.
    pub async fn list(
        &self,
        recipient_id: &str,
        options: ListOptions,
    ) -> NotificationResult<Vec<Notification>> {
        let limit = options.limit.min(MAX_LIST_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let filter = NotificationFilter {
            recipient_id: Some(recipient_id.to_string()),
            read: options.unread_only.then_some(false),
            types: options.types,
        };

        let mut notifications = bounded(
            self.timeout,
            self.store.query(filter, SortOrder::NewestFirst, Some(limit)),
        )
        .await?;
        notifications.truncate(limit as usize);
        Ok(notifications)
    }

    pub async fn count_unread(&self, recipient_id: &str) -> NotificationResult<u64> {
        bounded(
            self.timeout,
            self.store.count(NotificationFilter::recipient(recipient_id).unread()),
        )
        .await
    }
}
