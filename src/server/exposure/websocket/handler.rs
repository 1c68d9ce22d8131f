//! Websocket upgrade handler and per-connection loop
//!
//! Each connection receives a welcome message with its id, then a single
//! loop multiplexes client frames and queued server messages until either
//! side goes away.

use super::manager::ConnectionManager;
use super::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt};
use futures::stream::StreamExt;
use std::sync::Arc;

/// GET /realtime/v1/websocket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(manager): State<Arc<ConnectionManager>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, manager))
}

async fn handle_socket(socket: WebSocket, manager: Arc<ConnectionManager>) {
    let (conn_id, mut outbound) = manager.connect().await;
    let (mut ws_write, mut ws_read) = socket.split();

    let welcome = ServerMessage::Welcome {
        connection_id: conn_id.clone(),
    };
    if send_json(&mut ws_write, &welcome).await.is_err() {
        manager.disconnect(&conn_id).await;
        return;
    }

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(message) = queued else { break };
                if send_json(&mut ws_write, &message).await.is_err() {
                    tracing::debug!(connection_id = %conn_id, "websocket write failed, closing");
                    break;
                }
            }
            frame = ws_read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(&manager, &conn_id, &text).await;
                        if send_json(&mut ws_write, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %conn_id, "client closed the connection");
                        break;
                    }
                    // Pings are answered by axum; binary frames are not part of the protocol
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %conn_id, error = %e, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    manager.disconnect(&conn_id).await;
}

async fn send_json<S>(sink: &mut S, message: &ServerMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = serde_json::to_string(message).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize ServerMessage");
    })?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Process one client frame and build the direct reply
pub(crate) async fn handle_client_message(
    manager: &ConnectionManager,
    connection_id: &str,
    text: &str,
) -> ServerMessage {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
        }
    };

    match msg {
        ClientMessage::Subscribe { filter } => {
            match manager.subscribe(connection_id, filter.clone()).await {
                Ok(subscription_id) => ServerMessage::Subscribed {
                    subscription_id,
                    filter,
                },
                Err(message) => ServerMessage::Error { message },
            }
        }
        ClientMessage::Unsubscribe { subscription_id } => {
            match manager.unsubscribe(connection_id, &subscription_id).await {
                Ok(true) => ServerMessage::Unsubscribed { subscription_id },
                Ok(false) => ServerMessage::Error {
                    message: format!("Subscription {} not found", subscription_id),
                },
                Err(message) => ServerMessage::Error { message },
            }
        }
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Table;

    #[tokio::test]
    async fn test_ping_pong() {
        let cm = ConnectionManager::new();
        let (conn_id, _rx) = cm.connect().await;

        let reply = handle_client_message(&cm, &conn_id, r#"{"type":"ping"}"#).await;
        assert!(matches!(reply, ServerMessage::Pong));
    }

    #[tokio::test]
    async fn test_subscribe_then_unsubscribe() {
        let cm = ConnectionManager::new();
        let (conn_id, _rx) = cm.connect().await;

        let reply = handle_client_message(
            &cm,
            &conn_id,
            r#"{"type":"subscribe","filter":{"table":"rsvp_messages"}}"#,
        )
        .await;
        let subscription_id = match reply {
            ServerMessage::Subscribed {
                subscription_id,
                filter,
            } => {
                assert_eq!(filter.table, Some(Table::RsvpMessages));
                subscription_id
            }
            other => panic!("Expected Subscribed, got {:?}", other),
        };

        let unsubscribe = format!(
            r#"{{"type":"unsubscribe","subscription_id":"{}"}}"#,
            subscription_id
        );
        let reply = handle_client_message(&cm, &conn_id, &unsubscribe).await;
        assert!(matches!(reply, ServerMessage::Unsubscribed { .. }));

        let reply = handle_client_message(&cm, &conn_id, &unsubscribe).await;
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn test_invalid_frame_reports_error() {
        let cm = ConnectionManager::new();
        let (conn_id, _rx) = cm.connect().await;

        let reply = handle_client_message(&cm, &conn_id, "not json").await;
        match reply {
            ServerMessage::Error { message } => assert!(message.starts_with("Invalid message")),
            other => panic!("Expected Error, got {:?}", other),
        }
    }
}
