pub mod connection;
pub mod feed;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use herald_db::{
        Database, NotificationFilter, NotificationPatch, NotificationStore, SortOrder, SqliteStore,
        StoreChange,
    };
    use herald_types::error::{NotificationError, NotificationResult};
    use herald_types::models::{Notification, NotificationDraft, NotificationType, Priority};

    pub fn sqlite_store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::new(Arc::new(Database::open_in_memory().unwrap())))
    }

    pub fn draft(recipient: &str, title: &str) -> NotificationDraft {
        NotificationDraft {
            recipient_id: recipient.into(),
            sender_id: None,
            kind: NotificationType::NewMessage,
            title: title.into(),
            message: "hello".into(),
            data: None,
            action_url: None,
            priority: Priority::Normal,
        }
    }

    /// Store whose change channel is already closed, and whose queries can
    /// be made to fail.
    pub struct BrokenStore {
        inner: SqliteStore,
        fail_queries: bool,
    }

    #[async_trait]
    impl NotificationStore for BrokenStore {
        async fn insert(&self, draft: NotificationDraft) -> NotificationResult<Notification> {
            self.inner.insert(draft).await
        }

        async fn get(&self, id: Uuid) -> NotificationResult<Notification> {
            self.inner.get(id).await
        }

        async fn update(&self, id: Uuid, patch: NotificationPatch) -> NotificationResult<bool> {
            self.inner.update(id, patch).await
        }

        async fn delete(&self, id: Uuid) -> NotificationResult<()> {
            self.inner.delete(id).await
        }

        async fn query(
            &self,
            filter: NotificationFilter,
            sort: SortOrder,
            limit: Option<u32>,
        ) -> NotificationResult<Vec<Notification>> {
            if self.fail_queries {
                return Err(NotificationError::unavailable("database is locked"));
            }
            self.inner.query(filter, sort, limit).await
        }

        async fn count(&self, filter: NotificationFilter) -> NotificationResult<u64> {
            self.inner.count(filter).await
        }

        fn changes(&self) -> broadcast::Receiver<StoreChange> {
            let (_tx, rx) = broadcast::channel(1);
            rx
        }
    }

    pub fn broken_store(fail_queries: bool) -> Arc<BrokenStore> {
        Arc::new(BrokenStore {
            inner: SqliteStore::new(Arc::new(Database::open_in_memory().unwrap())),
            fail_queries,
        })
    }
}
