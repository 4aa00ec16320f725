//! Producer WebSocket endpoint

use super::AppState;
use crate::pipeline::Pipeline;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub async fn traffic_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_producer(socket, state.pipeline))
}

/// Read transaction records until the producer goes away.
///
/// Bad messages are logged and skipped; only a close or a transport error
/// ends the loop. Nothing is replayed for a reconnecting producer.
pub async fn handle_producer(mut socket: WebSocket, pipeline: Arc<Pipeline>) {
    info!("Producer connected to traffic endpoint");
    let mut accepted: u64 = 0;
    let mut dropped: u64 = 0;

    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Producer connection error");
                break;
            }
        };

        let result = match message {
            Message::Text(text) => pipeline.ingest_message(text.as_str()),
            Message::Binary(bytes) => pipeline.ingest_bytes(&bytes),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        match result {
            Ok(flow) => {
                accepted += 1;
                debug!(
                    flow_id = %flow.flow_id(),
                    method = %flow.record().method,
                    host = %flow.record().host,
                    "Received traffic from producer"
                );
            }
            Err(e) => {
                dropped += 1;
                warn!(error = %e, "Dropping producer message");
            }
        }
    }

    info!(accepted, dropped, "Producer disconnected from traffic endpoint");
}
