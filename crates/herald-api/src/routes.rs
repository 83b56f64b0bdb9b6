use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::middleware::require_auth;
use crate::notifications;
use crate::state::AppState;

/// REST routes for notifications. The push stream is mounted by the server
/// next to these, behind the same auth layer.
pub fn router(state: AppState) -> Router {
    let notification_routes = Router::new()
        .route(
            "/notifications",
            post(notifications::create_notification).get(notifications::list_notifications),
        )
        .route("/notifications/batch", post(notifications::create_batch))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete_notification))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .route("/health", get(notifications::health))
        .merge(notification_routes)
}
