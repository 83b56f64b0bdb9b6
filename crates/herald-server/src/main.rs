mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use herald_api::middleware::require_auth;
use herald_api::state::AppStateInner;
use herald_db::{Database, NotificationStore, SqliteStore};
use herald_gateway::connection;
use herald_gateway::feed::{FeedConfig, LiveFeed};

use crate::config::Config;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamQuery {
    recipient_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.jwt_secret.is_none() {
        info!("HERALD_JWT_SECRET not set, notification routes are open");
    }

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let store: Arc<dyn NotificationStore> = Arc::new(SqliteStore::new(db));

    // Shared state
    let app_state = AppStateInner::new(store.clone(), config.store_timeout, config.jwt_secret.clone());
    let feed = LiveFeed::new(
        store,
        FeedConfig {
            snapshot_cap: config.feed_snapshot_cap,
            ..Default::default()
        },
    );

    let stream_route = Router::new()
        .route("/notifications/stream", get(stream_upgrade))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(feed);

    let app = herald_api::routes::router(app_state)
        .merge(stream_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Herald notification server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn stream_upgrade(
    State(feed): State<LiveFeed>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_stream(socket, feed, query.recipient_id))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
