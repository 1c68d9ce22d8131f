//! Connection registry for realtime clients
//!
//! Every change published on the [`EventBus`](crate::core::events::EventBus)
//! is fanned out to the connections whose subscriptions match it.
//!
//! ```text
//! EventBus ──recv──▶ ConnectionManager::run_dispatch_loop()
//!                          │
//!                    for each connection, for each subscription
//!                          │
//!                    filter.matches(change)? ──yes──▶ mpsc ──▶ socket writer
//! ```

use super::protocol::{FeedSubscription, ServerMessage, SubscriptionFilter};
use crate::core::events::EventEnvelope;
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

/// Upper bound on subscriptions held by a single connection
pub const MAX_SUBSCRIPTIONS_PER_CONNECTION: usize = 16;

struct ConnectionHandle {
    tx: mpsc::UnboundedSender<ServerMessage>,
    subscriptions: Vec<FeedSubscription>,
}

/// Tracks active connections and their subscriptions
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; returns its id and the outbound message queue
    pub async fn connect(&self) -> (String, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection_id = format!("conn_{}", Uuid::new_v4().simple());
        let (tx, rx) = mpsc::unbounded_channel();

        self.connections.write().await.insert(
            connection_id.clone(),
            ConnectionHandle {
                tx,
                subscriptions: Vec::new(),
            },
        );

        tracing::debug!(connection_id = %connection_id, "realtime client connected");
        (connection_id, rx)
    }

    pub async fn disconnect(&self, connection_id: &str) {
        if let Some(handle) = self.connections.write().await.remove(connection_id) {
            tracing::debug!(
                connection_id = %connection_id,
                subscriptions = handle.subscriptions.len(),
                "realtime client disconnected"
            );
        }
    }

    /// Add a subscription; returns its id
    pub async fn subscribe(
        &self,
        connection_id: &str,
        filter: SubscriptionFilter,
    ) -> Result<String, String> {
        let mut connections = self.connections.write().await;
        let conn = connections
            .get_mut(connection_id)
            .ok_or_else(|| format!("Connection {} not found", connection_id))?;

        if conn.subscriptions.len() >= MAX_SUBSCRIPTIONS_PER_CONNECTION {
            return Err(format!(
                "Too many subscriptions (max {})",
                MAX_SUBSCRIPTIONS_PER_CONNECTION
            ));
        }

        let subscription = FeedSubscription::new(filter);
        let subscription_id = subscription.id.clone();
        conn.subscriptions.push(subscription);

        tracing::debug!(
            connection_id = %connection_id,
            subscription_id = %subscription_id,
            "subscription added"
        );

        Ok(subscription_id)
    }

    /// Remove a subscription; `Ok(false)` when it did not exist
    pub async fn unsubscribe(
        &self,
        connection_id: &str,
        subscription_id: &str,
    ) -> Result<bool, String> {
        let mut connections = self.connections.write().await;
        let conn = connections
            .get_mut(connection_id)
            .ok_or_else(|| format!("Connection {} not found", connection_id))?;

        let before = conn.subscriptions.len();
        conn.subscriptions.retain(|s| s.id != subscription_id);
        Ok(conn.subscriptions.len() < before)
    }

    /// Queue a message for one connection
    pub async fn send_to(&self, connection_id: &str, message: ServerMessage) {
        if let Some(conn) = self.connections.read().await.get(connection_id) {
            // A closed queue means the writer is gone; cleanup happens on disconnect
            let _ = conn.tx.send(message);
        }
    }

    async fn dispatch(&self, envelope: &EventEnvelope) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;

        for (connection_id, handle) in connections.iter() {
            for subscription in handle
                .subscriptions
                .iter()
                .filter(|s| s.filter.matches(&envelope.event))
            {
                let message = ServerMessage::Event {
                    subscription_id: subscription.id.clone(),
                    data: envelope.clone(),
                };

                if handle.tx.send(message).is_err() {
                    tracing::debug!(connection_id = %connection_id, "dropping event for closed connection");
                    break;
                }
                delivered += 1;
            }
        }

        delivered
    }

    /// Tell every subscription that changes were skipped
    async fn resync_all(&self) -> usize {
        let connections = self.connections.read().await;
        let mut notified = 0;

        for handle in connections.values() {
            for subscription in &handle.subscriptions {
                let message = ServerMessage::Resync {
                    subscription_id: subscription.id.clone(),
                };
                if handle.tx.send(message).is_err() {
                    break;
                }
                notified += 1;
            }
        }

        notified
    }

    /// Forward every change from the bus until it closes
    ///
    /// When the loop falls behind the bus, every subscription receives a
    /// [`ServerMessage::Resync`] in place of the skipped changes.
    pub async fn run_dispatch_loop(&self, mut rx: broadcast::Receiver<EventEnvelope>) {
        tracing::info!("realtime dispatch loop started");

        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    let delivered = self.dispatch(&envelope).await;
                    tracing::trace!(
                        table = %envelope.event.table(),
                        action = %envelope.event.kind(),
                        delivered = delivered,
                        "change dispatched"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    let notified = self.resync_all().await;
                    tracing::warn!(
                        count = count,
                        notified = notified,
                        "realtime dispatch lagged, {} events skipped",
                        count
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("event bus closed, stopping realtime dispatch loop");
                    break;
                }
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{ChangeEvent, ChangeKind, EventBus};
    use crate::core::model::Table;
    use serde_json::json;
    use std::sync::Arc;

    fn insert(table: Table) -> EventEnvelope {
        EventEnvelope::new(ChangeEvent::Insert {
            table,
            new: json!({"id": 1}),
        })
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let cm = ConnectionManager::new();

        let (conn_id, _rx) = cm.connect().await;
        assert!(conn_id.starts_with("conn_"));
        assert_eq!(cm.connection_count().await, 1);

        cm.disconnect(&conn_id).await;
        assert_eq!(cm.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let cm = ConnectionManager::new();
        let (conn_id, _rx) = cm.connect().await;

        let sub_id = cm
            .subscribe(&conn_id, SubscriptionFilter::table(Table::RsvpMessages))
            .await
            .unwrap();
        assert!(sub_id.starts_with("sub_"));

        assert!(cm.unsubscribe(&conn_id, &sub_id).await.unwrap());
        assert!(!cm.unsubscribe(&conn_id, &sub_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_subscribe_unknown_connection() {
        let cm = ConnectionManager::new();
        let result = cm.subscribe("conn_missing", SubscriptionFilter::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscription_limit() {
        let cm = ConnectionManager::new();
        let (conn_id, _rx) = cm.connect().await;

        for _ in 0..MAX_SUBSCRIPTIONS_PER_CONNECTION {
            cm.subscribe(&conn_id, SubscriptionFilter::default()).await.unwrap();
        }
        assert!(cm.subscribe(&conn_id, SubscriptionFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_respects_filters() {
        let cm = ConnectionManager::new();
        let (conn_id, mut rx) = cm.connect().await;
        let sub_id = cm
            .subscribe(
                &conn_id,
                SubscriptionFilter {
                    table: Some(Table::GuestInvitations),
                    event: Some(ChangeKind::Insert),
                },
            )
            .await
            .unwrap();

        assert_eq!(cm.dispatch(&insert(Table::RsvpMessages)).await, 0);
        assert_eq!(cm.dispatch(&insert(Table::GuestInvitations)).await, 1);

        match rx.recv().await.unwrap() {
            ServerMessage::Event {
                subscription_id,
                data,
            } => {
                assert_eq!(subscription_id, sub_id);
                assert_eq!(data.event.table(), Table::GuestInvitations);
            }
            other => panic!("Expected Event, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_loop_forwards_bus_events() {
        let bus = EventBus::new(16);
        let cm = Arc::new(ConnectionManager::new());
        let (conn_id, mut rx) = cm.connect().await;
        cm.subscribe(&conn_id, SubscriptionFilter::default()).await.unwrap();

        let loop_cm = cm.clone();
        let bus_rx = bus.subscribe();
        let task = tokio::spawn(async move { loop_cm.run_dispatch_loop(bus_rx).await });

        bus.publish(ChangeEvent::Delete {
            table: Table::RsvpMessages,
            id: None,
        });

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(msg, ServerMessage::Event { .. }));

        task.abort();
    }

    #[tokio::test]
    async fn test_dispatch_lag_sends_resync() {
        let bus = EventBus::new(2);
        let cm = Arc::new(ConnectionManager::new());
        let (conn_id, mut rx) = cm.connect().await;
        let sub_id = cm.subscribe(&conn_id, SubscriptionFilter::default()).await.unwrap();

        // Overflow the bus before the loop starts reading
        let bus_rx = bus.subscribe();
        for id in 0..5 {
            bus.publish(ChangeEvent::Delete {
                table: Table::GuestInvitations,
                id: Some(json!(id)),
            });
        }

        let loop_cm = cm.clone();
        let task = tokio::spawn(async move { loop_cm.run_dispatch_loop(bus_rx).await });

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match msg {
            ServerMessage::Resync { subscription_id } => assert_eq!(subscription_id, sub_id),
            other => panic!("Expected Resync, got {:?}", other),
        }

        // The changes still buffered follow as usual
        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(msg, ServerMessage::Event { .. }));

        task.abort();
    }
}
