use std::sync::Arc;
use std::time::Duration;

use herald_db::NotificationStore;

use crate::read_state::ReadStateManager;
use crate::reader::NotificationReader;
use crate::writer::NotificationWriter;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub writer: NotificationWriter,
    pub reader: NotificationReader,
    pub read_state: ReadStateManager,
    /// When set, notification routes require a bearer token signed with it.
    pub jwt_secret: Option<String>,
}

impl AppStateInner {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        store_timeout: Option<Duration>,
        jwt_secret: Option<String>,
    ) -> AppState {
        Arc::new(Self {
            writer: NotificationWriter::new(store.clone(), store_timeout),
            reader: NotificationReader::new(store.clone(), store_timeout),
            read_state: ReadStateManager::new(store, store_timeout),
            jwt_secret,
        })
    }
}
