//! Change feed for the watched tables
//!
//! The EventBus is the core of the real-time system. It uses `tokio::sync::broadcast`
//! to decouple mutations (stores, REST handlers) from notifications (WebSocket
//! subscribers, in-process page subscriptions).
//!
//! # Architecture
//!
//! ```text
//! RowService::insert ──┐
//!                      ├──▶ EventBus::publish() ──▶ broadcast ──▶ WebSocket subscribers
//! RowService::delete ──┘                                     ──▶ Subscription<T> streams
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let event_bus = EventBus::new(1024);
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.publish(ChangeEvent::Insert {
//!     table: Table::RsvpMessages,
//!     new: json!({"guest_name": "Tamu"}),
//! });
//!
//! if let Ok(envelope) = rx.recv().await {
//!     println!("Received: {:?}", envelope.event);
//! }
//! ```

use crate::core::model::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Kind of row change, used for subscription filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A row-level change on one of the watched tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A row was inserted
    Insert { table: Table, new: serde_json::Value },
    /// A row was replaced
    Update { table: Table, new: serde_json::Value },
    /// A row was deleted
    ///
    /// `id` is `None` for a wildcard delete that removed every row of the table.
    Delete {
        table: Table,
        id: Option<serde_json::Value>,
    },
}

impl ChangeEvent {
    /// The table this change applies to
    pub fn table(&self) -> Table {
        match self {
            ChangeEvent::Insert { table, .. }
            | ChangeEvent::Update { table, .. }
            | ChangeEvent::Delete { table, .. } => *table,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }
}

/// Envelope wrapping a change event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: ChangeEvent,
}

impl EventEnvelope {
    /// Create a new event envelope
    pub fn new(event: ChangeEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based change feed
///
/// The bus is cheap to clone (the sender is reference counted) and can be
/// shared between stores, the websocket exposure and in-process pages.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start losing events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a change to all subscribers
    ///
    /// Never fails. Without subscribers the event is dropped. Returns the
    /// number of receivers that will see the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        tracing::trace!(
            table = %envelope.event.table(),
            action = %envelope.event.kind(),
            "publishing change"
        );
        // send() returns Err only if there are no receivers
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to all future changes
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the current number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_event_wire_format() {
        let event = ChangeEvent::Insert {
            table: Table::RsvpMessages,
            new: json!({"guest_name": "Tamu"}),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "insert");
        assert_eq!(json["table"], "rsvp_messages");
        assert_eq!(json["new"]["guest_name"], "Tamu");
    }

    #[test]
    fn test_wildcard_delete_wire_format() {
        let event = ChangeEvent::Delete {
            table: Table::GuestInvitations,
            id: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "delete");
        assert!(json["id"].is_null());
        assert_eq!(event.kind(), ChangeKind::Delete);
        assert_eq!(event.table(), Table::GuestInvitations);
    }

    #[test]
    fn test_envelope_has_metadata() {
        let envelope = EventEnvelope::new(ChangeEvent::Delete {
            table: Table::RsvpMessages,
            id: Some(json!(Uuid::nil())),
        });
        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let receivers = bus.publish(ChangeEvent::Insert {
            table: Table::GuestInvitations,
            new: json!({"id": 1}),
        });
        assert_eq!(receivers, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.kind(), ChangeKind::Insert);
        assert_eq!(received.event.table(), Table::GuestInvitations);
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        bus.publish(ChangeEvent::Delete {
            table: Table::RsvpMessages,
            id: None,
        });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.id, e2.id);
    }

    #[test]
    fn test_event_bus_publish_without_subscribers() {
        let bus = EventBus::default();
        let receivers = bus.publish(ChangeEvent::Delete {
            table: Table::RsvpMessages,
            id: None,
        });
        assert_eq!(receivers, 0);
    }
}
