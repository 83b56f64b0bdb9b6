//! Persistence boundary for notifications.
//!
//! [`NotificationStore`] is the only way the rest of the service touches the
//! database. Every successful mutation is published on a change channel so
//! that live feeds can observe the store instead of being told by writers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use herald_types::error::{NotificationError, NotificationResult};
use herald_types::models::{Notification, NotificationDraft, NotificationType, Priority};

use crate::Database;
use crate::models::NotificationRow;
use crate::queries::RowFilter;

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Published after a mutation touched one of `recipient_id`'s notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub recipient_id: String,
    pub notification_id: Uuid,
    pub kind: StoreChangeKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub recipient_id: Option<String>,
    pub read: Option<bool>,
    pub types: Option<Vec<NotificationType>>,
}

impl NotificationFilter {
    pub fn recipient(recipient_id: impl Into<String>) -> Self {
        Self {
            recipient_id: Some(recipient_id.into()),
            ..Default::default()
        }
    }

    pub fn unread(mut self) -> Self {
        self.read = Some(false);
        self
    }

    fn to_row_filter(&self) -> RowFilter {
        RowFilter {
            recipient_id: self.recipient_id.clone(),
            read: self.read,
            kinds: self
                .types
                .as_ref()
                .map(|types| types.iter().map(|t| t.as_str().to_string()).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Partial update. Read state only moves forward, so there is no unread field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationPatch {
    /// Mark read at this instant, unless already read.
    pub read_at: Option<DateTime<Utc>>,
    pub archived: Option<bool>,
}

#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Persist a draft, assigning `id`, `created_at` and `read = false`.
    async fn insert(&self, draft: NotificationDraft) -> NotificationResult<Notification>;

    async fn get(&self, id: Uuid) -> NotificationResult<Notification>;

    /// Returns whether the patch changed anything.
    async fn update(&self, id: Uuid, patch: NotificationPatch) -> NotificationResult<bool>;

    async fn delete(&self, id: Uuid) -> NotificationResult<()>;

    async fn query(
        &self,
        filter: NotificationFilter,
        sort: SortOrder,
        limit: Option<u32>,
    ) -> NotificationResult<Vec<Notification>>;

    async fn count(&self, filter: NotificationFilter) -> NotificationResult<u64>;

    /// Subscribe to mutations made after this call.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;
}

/// Run a store call under an optional deadline. Elapsed deadlines are
/// reported as `StoreUnavailable`.
pub async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> NotificationResult<T>
where
    F: Future<Output = NotificationResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            NotificationError::unavailable(format!("store call timed out after {:?}", limit))
        })?,
        None => fut.await,
    }
}

/// [`NotificationStore`] backed by SQLite. Blocking calls run on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { db, changes }
    }

    async fn blocking<T, F>(&self, f: F) -> NotificationResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                NotificationError::unavailable(e)
            })?
            .map_err(|e| {
                error!("Database error: {:#}", e);
                NotificationError::unavailable(e)
            })
    }

    fn publish(&self, recipient_id: String, notification_id: Uuid, kind: StoreChangeKind) {
        // No receivers is fine
        let _ = self.changes.send(StoreChange {
            recipient_id,
            notification_id,
            kind,
        });
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert(&self, draft: NotificationDraft) -> NotificationResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: draft.recipient_id,
            sender_id: draft.sender_id,
            kind: draft.kind,
            title: draft.title,
            message: draft.message,
            data: draft.data,
            action_url: draft.action_url,
            priority: draft.priority,
            read: false,
            read_at: None,
            archived: false,
            // Stored with microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
        };

        let row = to_row(&notification);
        self.blocking(move |db| db.insert_notification(&row)).await?;

        debug!(
            "Stored notification {} ({}) for {}",
            notification.id, notification.kind, notification.recipient_id
        );
        self.publish(
            notification.recipient_id.clone(),
            notification.id,
            StoreChangeKind::Created,
        );
        Ok(notification)
    }

    async fn get(&self, id: Uuid) -> NotificationResult<Notification> {
        let row = self
            .blocking(move |db| db.get_notification(&id.to_string()))
            .await?
            .ok_or(NotificationError::NotFound(id))?;
        from_row(row)
    }

    async fn update(&self, id: Uuid, patch: NotificationPatch) -> NotificationResult<bool> {
        let read_at = patch.read_at.map(format_timestamp);
        let archived = patch.archived;

        let (recipient_id, changed) = self
            .blocking(move |db| db.update_notification(&id.to_string(), read_at.as_deref(), archived))
            .await?
            .ok_or(NotificationError::NotFound(id))?;

        if changed {
            self.publish(recipient_id, id, StoreChangeKind::Updated);
        }
        Ok(changed)
    }

    async fn delete(&self, id: Uuid) -> NotificationResult<()> {
        let recipient_id = self
            .blocking(move |db| db.delete_notification(&id.to_string()))
            .await?
            .ok_or(NotificationError::NotFound(id))?;

        self.publish(recipient_id, id, StoreChangeKind::Deleted);
        Ok(())
    }

    async fn query(
        &self,
        filter: NotificationFilter,
        sort: SortOrder,
        limit: Option<u32>,
    ) -> NotificationResult<Vec<Notification>> {
        let filter = filter.to_row_filter();
        let newest_first = sort == SortOrder::NewestFirst;

        let rows = self
            .blocking(move |db| db.query_notifications(&filter, newest_first, limit))
            .await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn count(&self, filter: NotificationFilter) -> NotificationResult<u64> {
        let filter = filter.to_row_filter();
        self.blocking(move |db| db.count_notifications(&filter)).await
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    // Fixed width, so lexical order in SQLite matches chronological order
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, id: &str) -> NotificationResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| NotificationError::unavailable(format!("corrupt timestamp '{}' on {}: {}", raw, id, e)))
}

fn to_row(n: &Notification) -> NotificationRow {
    NotificationRow {
        id: n.id.to_string(),
        recipient_id: n.recipient_id.clone(),
        sender_id: n.sender_id.clone(),
        kind: n.kind.as_str().to_string(),
        title: n.title.clone(),
        message: n.message.clone(),
        data: n.data.as_ref().map(|v| v.to_string()),
        action_url: n.action_url.clone(),
        priority: n.priority.as_str().to_string(),
        read: n.read,
        read_at: n.read_at.map(format_timestamp),
        archived: n.archived,
        created_at: format_timestamp(n.created_at),
    }
}

fn from_row(row: NotificationRow) -> NotificationResult<Notification> {
    let corrupt = |field: &str, detail: String| {
        NotificationError::unavailable(format!("corrupt {} on {}: {}", field, row.id, detail))
    };

    let id: Uuid = row.id.parse().map_err(|e: uuid::Error| corrupt("id", e.to_string()))?;
    let kind: NotificationType = row.kind.parse().map_err(|e: NotificationError| corrupt("kind", e.to_string()))?;
    let priority: Priority = row
        .priority
        .parse()
        .map_err(|e: NotificationError| corrupt("priority", e.to_string()))?;
    let data = row
        .data
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| corrupt("data", e.to_string()))?;
    let read_at = row
        .read_at
        .as_deref()
        .map(|raw| parse_timestamp(raw, &row.id))
        .transpose()?;
    let created_at = parse_timestamp(&row.created_at, &row.id)?;

    Ok(Notification {
        id,
        recipient_id: row.recipient_id,
        sender_id: row.sender_id,
        kind,
        title: row.title,
        message: row.message,
        data,
        action_url: row.action_url,
        priority,
        read: row.read,
        read_at,
        archived: row.archived,
        created_at,
    })
}
