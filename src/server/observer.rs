//! Observer WebSocket endpoint

use super::AppState;
use crate::pipeline::Pipeline;
use crate::registry::Payload;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub async fn dashboard_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let queue = state.config.server.observer_queue;
    ws.on_upgrade(move |socket| handle_observer(socket, state.pipeline, queue))
}

/// Push queued events to one observer until either side goes away.
///
/// Whenever the queue runs dry the observer is offered a resync, which only
/// takes effect if it skipped events while full. Inbound frames are read
/// only to notice a close; their content is ignored.
pub async fn handle_observer(socket: WebSocket, pipeline: Arc<Pipeline>, queue: usize) {
    let (tx, mut rx) = mpsc::channel::<Payload>(queue.max(1));
    let Some(id) = pipeline.register_observer(tx) else {
        return;
    };

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(payload) => {
                    if let Err(e) = sink.send(Message::Text(payload.to_string().into())).await {
                        debug!(observer_id = id, error = %e, "Send to observer failed");
                        break;
                    }
                    if rx.is_empty() {
                        pipeline.resync_observer(id);
                    }
                }
                None => {
                    debug!(observer_id = id, "Observer removed by registry");
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(observer_id = id, error = %e, "Observer connection error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    pipeline.unregister_observer(id);
    let _ = sink.close().await;
}
