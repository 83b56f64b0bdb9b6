//! Live unread feed per connected recipient.
//!
//! A subscription watches the store's change channel and re-emits the
//! recipient's full unread snapshot whenever it changes. Bursts of writes are
//! coalesced: pending change events are drained before a snapshot is taken,
//! and a snapshot equal to the previous one is not emitted again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use herald_db::{NotificationFilter, NotificationStore, SortOrder, StoreChange};
use herald_types::error::{NotificationError, NotificationResult};
use herald_types::models::Notification;

pub const DEFAULT_SNAPSHOT_CAP: u32 = 10;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Maximum number of unread notifications per snapshot, newest first.
    pub snapshot_cap: u32,
    /// How many times a failed snapshot query is retried before giving up.
    pub reconnect_attempts: u32,
    /// Base delay between retries; grows linearly per attempt.
    pub reconnect_backoff: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            snapshot_cap: DEFAULT_SNAPSHOT_CAP,
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(500),
        }
    }
}

/// Stops a subscription. Cancelling is idempotent and never fails, also
/// after the feed has already stopped on its own.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled or once the feed stopped for any other reason.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Clone)]
pub struct LiveFeed {
    store: Arc<dyn NotificationStore>,
    config: FeedConfig,
}

impl LiveFeed {
    pub fn new(store: Arc<dyn NotificationStore>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    /// Start pushing `recipient_id`'s unread snapshot to `on_update`.
    ///
    /// Returns immediately; the first snapshot is delivered from a spawned
    /// task, so this must be called inside a Tokio runtime. `on_update` is
    /// never invoked concurrently with itself. `on_error` is invoked at most
    /// once, when the feed cannot continue, and is not invoked after
    /// cancellation.
    pub fn subscribe<U, E>(&self, recipient_id: impl Into<String>, on_update: U, on_error: E) -> CancelHandle
    where
        U: FnMut(Vec<Notification>) + Send + 'static,
        E: FnOnce(NotificationError) + Send + 'static,
    {
        let recipient_id = recipient_id.into();
        let token = CancellationToken::new();

        // Listen before the first snapshot so no change can slip in between
        let task = FeedTask {
            store: self.store.clone(),
            config: self.config.clone(),
            changes: self.store.changes(),
            recipient_id,
            token: token.clone(),
            last: None,
        };
        tokio::spawn(task.run(on_update, on_error));

        CancelHandle { token }
    }
}

struct FeedTask {
    store: Arc<dyn NotificationStore>,
    config: FeedConfig,
    changes: broadcast::Receiver<StoreChange>,
    recipient_id: String,
    token: CancellationToken,
    last: Option<Vec<Notification>>,
}

impl FeedTask {
    async fn run<U, E>(mut self, mut on_update: U, on_error: E)
    where
        U: FnMut(Vec<Notification>) + Send + 'static,
        E: FnOnce(NotificationError) + Send + 'static,
    {
        debug!("Feed for {} started", self.recipient_id);
        let token = self.token.clone();

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Ok(()),
            result = self.drive(&mut on_update) => result,
        };

        let failure = match outcome {
            Err(e) if !token.is_cancelled() => Some(e),
            _ => None,
        };

        // Stopped before the error is reported, so the handle already says so
        token.cancel();
        if let Some(e) = failure {
            warn!("Feed for {} failed: {}", self.recipient_id, e);
            on_error(e);
        }
        debug!("Feed for {} stopped", self.recipient_id);
    }

    async fn drive<U>(&mut self, on_update: &mut U) -> NotificationResult<()>
    where
        U: FnMut(Vec<Notification>),
    {
        self.emit(on_update).await?;

        loop {
            match self.changes.recv().await {
                Ok(change) if change.recipient_id != self.recipient_id => continue,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    // Some events were lost; a fresh snapshot covers them
                    info!("Feed for {} lagged by {} changes, resyncing", self.recipient_id, skipped);
                }
                Err(RecvError::Closed) => {
                    return Err(NotificationError::Subscription(
                        "store change channel closed".to_string(),
                    ));
                }
            }

            self.drain_pending();
            self.emit(on_update).await?;
        }
    }

    /// Swallow queued events; the next snapshot reflects all of them.
    fn drain_pending(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    async fn emit<U>(&mut self, on_update: &mut U) -> NotificationResult<()>
    where
        U: FnMut(Vec<Notification>),
    {
        let snapshot = self.snapshot().await?;
        if self.last.as_ref() == Some(&snapshot) || self.token.is_cancelled() {
            return Ok(());
        }

        debug!("Feed for {}: {} unread", self.recipient_id, snapshot.len());
        self.last = Some(snapshot.clone());
        on_update(snapshot);
        Ok(())
    }

    async fn snapshot(&self) -> NotificationResult<Vec<Notification>> {
        let mut attempt = 0;
        loop {
            let result = self
                .store
                .query(
                    NotificationFilter::recipient(&self.recipient_id).unread(),
                    SortOrder::NewestFirst,
                    Some(self.config.snapshot_cap),
                )
                .await;

            match result {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if attempt < self.config.reconnect_attempts => {
                    attempt += 1;
                    warn!(
                        "Feed for {}: snapshot failed ({}), retry {}/{}",
                        self.recipient_id, e, attempt, self.config.reconnect_attempts
                    );
                    tokio::time::sleep(self.config.reconnect_backoff * attempt).await;
                }
                Err(e) => {
                    return Err(NotificationError::Subscription(format!(
                        "unread snapshot failed after {} attempts: {}",
                        attempt + 1,
                        e
                    )));
                }
            }
        }
    }
}
