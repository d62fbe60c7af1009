//! WebSocket handler for live outbox status.
//!
//! Pushes a `status` frame on connect and on every engine status change, and
//! answers `drain`, `status` and `ping` requests.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use outbox_engine::Engine;
use tokio::sync::mpsc;

use crate::websocket::{ClientMessage, ServerMessage};

use super::handle_drain;

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Spawns a task to forward outgoing messages
/// 2. Spawns a task relaying engine status changes
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(socket: WebSocket, engine: Engine) {
    let conn_id = uuid::Uuid::new_v4().to_string();

    // Split the socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    tracing::info!(conn_id = %conn_id, "WebSocket client connected");

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    // Relay status changes
    let mut watcher = engine.subscribe();
    let status_tx = tx.clone();
    let status_task = tokio::spawn(async move {
        if status_tx.send(ServerMessage::status(watcher.current())).is_err() {
            return;
        }
        while let Some(status) = watcher.changed().await {
            if status_tx.send(ServerMessage::status(status)).is_err() {
                break;
            }
        }
    });

    // Process incoming messages
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(&text, &engine).await;
                if tx.send(response).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    // Clean up
    status_task.abort();
    send_task.abort();

    tracing::info!(conn_id = %conn_id, "WebSocket client disconnected");
}

/// Process a client message and return the reply.
async fn process_message(text: &str, engine: &Engine) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::error(format!("Invalid message format: {}", e), None);
        }
    };

    match client_msg {
        ClientMessage::Drain { request_id } => match handle_drain(engine).await {
            Ok(report) => ServerMessage::DrainReport { report, request_id },
            Err(e) => ServerMessage::error(e.to_string(), request_id),
        },
        ClientMessage::Status => ServerMessage::status(engine.status()),
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use outbox_engine::{MemoryStore, OfflineRecord, RemoteApplier};
    use std::sync::Arc;

    struct Accept;

    #[async_trait]
    impl RemoteApplier for Accept {
        async fn apply(&self, _record: &OfflineRecord) -> outbox_engine::Result<()> {
            Ok(())
        }
    }

    fn engine() -> Engine {
        Engine::new(Arc::new(MemoryStore::new()), Arc::new(Accept))
    }

    #[tokio::test]
    async fn ping_and_status() {
        let engine = engine();
        assert!(matches!(
            process_message(r#"{"type":"ping"}"#, &engine).await,
            ServerMessage::Pong
        ));
        assert!(matches!(
            process_message(r#"{"type":"status"}"#, &engine).await,
            ServerMessage::Status { status } if status.pending_count == 0
        ));
    }

    #[tokio::test]
    async fn drain_request() {
        let engine = engine();
        engine
            .enqueue(outbox_engine::EntityType::WorkOrder, serde_json::json!({}))
            .await
            .unwrap();

        let reply = process_message(r#"{"type":"drain","request_id":"d1"}"#, &engine).await;
        match reply {
            ServerMessage::DrainReport { report, request_id } => {
                assert_eq!(report.synced, 1);
                assert_eq!(request_id.as_deref(), Some("d1"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_message() {
        let reply = process_message("not json", &engine()).await;
        assert!(matches!(reply, ServerMessage::Error { request_id: None, .. }));
    }
}
