use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use herald_types::api::ErrorBody;
use herald_types::events::StreamFrame;

use crate::feed::{CancelHandle, LiveFeed};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Push `recipient_id`'s unread snapshots over an upgraded WebSocket.
///
/// Each frame is the full unread list as a JSON array. A slow client only
/// ever receives the latest snapshot; intermediate ones are dropped. When
/// the feed fails, a single error object is sent and the socket is closed.
pub async fn handle_stream(socket: WebSocket, feed: LiveFeed, recipient_id: String) {
    let (sender, receiver) = socket.split();
    run_stream(sender, receiver, feed, recipient_id, HEARTBEAT_INTERVAL).await;
}

/// Drive one stream connection until either side goes away. Returns the
/// feed's handle, already cancelled.
async fn run_stream<Tx, Rx, E>(
    sender: Tx,
    mut receiver: Rx,
    feed: LiveFeed,
    recipient_id: String,
    heartbeat_every: Duration,
) -> CancelHandle
where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    // Latest frame wins; the send task never queues stale snapshots
    let (frame_tx, frame_rx) = watch::channel::<Option<StreamFrame>>(None);
    let error_tx = frame_tx.clone();

    let handle = feed.subscribe(
        recipient_id.clone(),
        move |unread| {
            frame_tx.send_replace(Some(StreamFrame::Unread(unread)));
        },
        move |e| {
            error_tx.send_replace(Some(StreamFrame::Error(ErrorBody::from(&e))));
        },
    );

    info!("{} connected to notification stream", recipient_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(forward_frames(sender, frame_rx, pong_received, heartbeat_every));

    // The stream is push-only; incoming frames only matter for liveness
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                Message::Text(text) => debug!("Ignoring client text on stream: {} bytes", text.len()),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    handle.cancel();
    info!("{} disconnected from notification stream", recipient_id);
    handle
}

async fn forward_frames<Tx>(
    mut sender: Tx,
    mut frame_rx: watch::Receiver<Option<StreamFrame>>,
    pong_received: Arc<AtomicBool>,
    heartbeat_every: Duration,
) where
    Tx: Sink<Message> + Unpin,
{
    let mut heartbeat = tokio::time::interval(heartbeat_every);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            changed = frame_rx.changed() => {
                // Feed stopped and every frame has been delivered
                if changed.is_err() {
                    break;
                }

                let Some(frame) = frame_rx.borrow_and_update().clone() else {
                    continue;
                };
                let is_error = matches!(frame, StreamFrame::Error(_));

                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode stream frame: {}", e);
                        break;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
                if is_error {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use serde_json::Value;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio_util::sync::PollSender;

    use herald_db::NotificationStore;

    use crate::feed::FeedConfig;
    use crate::testing::{broken_store, draft, sqlite_store};

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_secs(3600);

    /// In-process stand-in for a WebSocket client.
    struct Client {
        from_server: mpsc::Receiver<Message>,
        to_server: Option<mpsc::Sender<Message>>,
        run: JoinHandle<CancelHandle>,
    }

    fn connect(feed: LiveFeed, recipient: &str, heartbeat_every: Duration) -> Client {
        let (server_tx, from_server) = mpsc::channel(16);
        let (to_server, mut client_rx) = mpsc::channel::<Message>(16);

        let incoming = futures_util::stream::poll_fn(move |cx| {
            client_rx.poll_recv(cx).map(|msg| msg.map(Ok::<_, Infallible>))
        });
        let run = tokio::spawn(run_stream(
            PollSender::new(server_tx),
            incoming,
            feed,
            recipient.to_string(),
            heartbeat_every,
        ));

        Client {
            from_server,
            to_server: Some(to_server),
            run,
        }
    }

    impl Client {
        async fn next(&mut self) -> Option<Message> {
            tokio::time::timeout(WAIT, self.from_server.recv())
                .await
                .expect("timed out waiting for server")
        }

        async fn next_json(&mut self) -> Value {
            match self.next().await {
                Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("expected a text frame, got {other:?}"),
            }
        }

        async fn finished(self) -> CancelHandle {
            tokio::time::timeout(WAIT, self.run)
                .await
                .expect("stream did not finish")
                .unwrap()
        }
    }

    #[tokio::test]
    async fn unread_snapshot_is_sent_on_connect_and_on_change() {
        let store = sqlite_store();
        store.insert(draft("u1", "first")).await.unwrap();
        store.insert(draft("u1", "second")).await.unwrap();
        let feed = LiveFeed::new(store.clone(), FeedConfig::default());

        let mut client = connect(feed, "u1", QUIET);

        let snapshot = client.next_json().await;
        let titles: Vec<_> = snapshot.as_array().unwrap().iter().map(|n| n["title"].clone()).collect();
        assert_eq!(titles, vec!["second", "first"]);

        store.insert(draft("u1", "third")).await.unwrap();
        let snapshot = client.next_json().await;
        assert_eq!(snapshot.as_array().unwrap().len(), 3);
        assert_eq!(snapshot[0]["title"], "third");

        // Client goes away: the subscription is torn down
        client.to_server.take();
        let handle = client.finished().await;
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn client_close_frame_cancels_the_feed() {
        let feed = LiveFeed::new(sqlite_store(), FeedConfig::default());
        let mut client = connect(feed, "u1", QUIET);
        assert_eq!(client.next_json().await, Value::Array(vec![]));

        let to_server = client.to_server.clone().unwrap();
        to_server.send(Message::Close(None)).await.unwrap();

        assert!(client.finished().await.is_cancelled());
    }

    #[tokio::test]
    async fn feed_failure_sends_error_then_closes() {
        let feed = LiveFeed::new(broken_store(false), FeedConfig::default());
        let mut client = connect(feed, "u1", QUIET);

        // The empty snapshot may be overtaken by the error; only the latest frame is kept
        let mut error = client.next_json().await;
        if error.is_array() {
            assert_eq!(error, Value::Array(vec![]));
            error = client.next_json().await;
        }
        assert_eq!(error["error"], "SubscriptionError");
        assert!(error["detail"].is_string());

        assert!(matches!(client.next().await, Some(Message::Close(None))));
        assert!(client.finished().await.is_cancelled());
    }

    #[tokio::test]
    async fn silent_client_is_dropped_after_two_missed_pongs() {
        let feed = LiveFeed::new(sqlite_store(), FeedConfig::default());
        let mut client = connect(feed, "u1", Duration::from_millis(20));

        let mut pings = 0;
        while let Some(msg) = client.next().await {
            if matches!(msg, Message::Ping(_)) {
                pings += 1;
            }
        }

        assert_eq!(pings, 2);
        assert!(client.finished().await.is_cancelled());
    }
}
