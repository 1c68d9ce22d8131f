//! Realtime message protocol definitions
//!
//! Defines the JSON messages exchanged between websocket clients and the server.
//!
//! ## Client → Server Messages
//!
//! ```json
//! // Subscribe to changes on a table
//! {"type": "subscribe", "filter": {"table": "rsvp_messages", "event": "insert"}}
//!
//! // Unsubscribe
//! {"type": "unsubscribe", "subscription_id": "sub_abc123"}
//!
//! // Keepalive
//! {"type": "ping"}
//! ```
//!
//! ## Server → Client Messages
//!
//! ```json
//! // Change notification
//! {"type": "event", "subscription_id": "sub_abc123", "data": {...}}
//!
//! // Subscription confirmed
//! {"type": "subscribed", "subscription_id": "sub_abc123", "filter": {...}}
//!
//! // Unsubscription confirmed
//! {"type": "unsubscribed", "subscription_id": "sub_abc123"}
//!
//! // Changes were skipped; reload the table
//! {"type": "resync", "subscription_id": "sub_abc123"}
//!
//! // Keepalive response
//! {"type": "pong"}
//!
//! // Error
//! {"type": "error", "message": "Invalid subscription filter"}
//! ```

use crate::core::events::{ChangeEvent, ChangeKind, EventEnvelope};
use crate::core::model::Table;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to changes matching a filter
    Subscribe {
        filter: SubscriptionFilter,
    },
    /// Unsubscribe from a specific subscription
    Unsubscribe {
        subscription_id: String,
    },
    /// Keepalive ping
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A change matching a subscription
    Event {
        /// Which subscription matched this change
        subscription_id: String,
        data: EventEnvelope,
    },
    /// Subscription confirmation
    Subscribed {
        subscription_id: String,
        filter: SubscriptionFilter,
    },
    /// Unsubscription confirmation
    Unsubscribed {
        subscription_id: String,
    },
    /// The server skipped changes this subscription may have matched
    Resync {
        subscription_id: String,
    },
    /// Keepalive response
    Pong,
    /// Error message
    Error {
        message: String,
    },
    /// Welcome message on connection
    Welcome {
        connection_id: String,
    },
}

/// Filter criteria for change subscriptions
///
/// Both fields are optional; `None` matches everything.
///
/// ```json
/// {}                                             // every change
/// {"table": "guest_invitations"}                 // one table
/// {"table": "rsvp_messages", "event": "insert"}  // inserts on one table
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SubscriptionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<ChangeKind>,
}

impl SubscriptionFilter {
    /// Only changes on `table`
    pub fn table(table: Table) -> Self {
        Self {
            table: Some(table),
            event: None,
        }
    }

    /// Check if a change matches this filter
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(table) = self.table
            && event.table() != table
        {
            return false;
        }

        if let Some(kind) = self.event
            && event.kind() != kind
        {
            return false;
        }

        true
    }
}

/// A subscription with its filter and a unique ID
#[derive(Debug, Clone)]
pub struct FeedSubscription {
    pub id: String,
    pub filter: SubscriptionFilter,
}

impl FeedSubscription {
    /// Create a new subscription with a generated ID
    pub fn new(filter: SubscriptionFilter) -> Self {
        Self {
            id: format!("sub_{}", Uuid::new_v4().simple()),
            filter,
        }
    }
}
