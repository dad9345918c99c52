use crate::signaling::relay::{Relay, RelaySubscription};
use crate::signaling::RelayHub;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use feedlink_core::{FeedKey, RelayPatch};
use futures::{SinkExt, StreamExt};
use tracing::{error, info, warn};

/// Routes exposing a [`RelayHub`] over WebSocket at `/relay/{space_id}/{feed_id}`.
///
/// Each socket receives every snapshot of its feed document as a JSON text frame and may send
/// [`RelayPatch`] JSON frames, which are merged into the document.
pub fn relay_router(hub: RelayHub) -> Router {
    Router::new()
        .route("/relay/{space_id}/{feed_id}", get(ws_handler))
        .with_state(hub)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((space_id, feed_id)): Path<(String, String)>,
    State(hub): State<RelayHub>,
) -> impl IntoResponse {
    let feed_key = FeedKey::new(space_id, feed_id);

    ws.on_upgrade(move |socket| handle_socket(socket, feed_key, hub))
}

async fn handle_socket(socket: WebSocket, feed_key: FeedKey, hub: RelayHub) {
    info!(feed = %feed_key, "Relay socket connected");

    let RelaySubscription { id, mut snapshots } = match hub.subscribe(&feed_key).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(feed = %feed_key, "Relay subscription refused: {}", e);
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn({
        let feed_key = feed_key.clone();

        async move {
            while let Some(document) = snapshots.recv().await {
                let json = match serde_json::to_string(&document) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(feed = %feed_key, "Failed to serialize relay document: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let hub = hub.clone();
        let feed_key = feed_key.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<RelayPatch>(&text) {
                        Ok(patch) => {
                            if let Err(e) = hub.merge(&feed_key, patch).await {
                                warn!(feed = %feed_key, "Relay write refused: {}", e);
                            }
                        }
                        Err(e) => warn!(feed = %feed_key, "Invalid relay patch: {}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    hub.unsubscribe(&feed_key, id).await;
    info!(feed = %feed_key, "Relay socket disconnected");
}
