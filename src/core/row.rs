//! Table rows, typed change notifications and subscriptions

use crate::core::events::{ChangeEvent, EventBus};
use crate::core::model::{
    GuestInvitation, NewGuestInvitation, NewRsvpMessage, RsvpMessage, Table,
};
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::AbortHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

/// A row of one of the watched tables
pub trait Row:
    Clone + Debug + Serialize + DeserializeOwned + PartialEq + Send + Sync + 'static
{
    /// Storage-assigned identity
    type Id: Copy
        + Eq
        + Hash
        + Debug
        + Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Insert payload (everything but identity and timestamp)
    type Draft: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    const TABLE: Table;

    fn id(&self) -> Self::Id;

    fn created_at(&self) -> DateTime<Utc>;

    /// Identity no row ever carries, used by `delete ... where id <> sentinel`
    fn sentinel() -> Self::Id;

    /// Identity for the `serial`-th row inserted into an in-memory table
    fn assign_id(serial: i64) -> Self::Id;

    /// Build the stored row from its draft
    fn materialize(id: Self::Id, draft: Self::Draft, created_at: DateTime<Utc>) -> Self;
}

impl Row for GuestInvitation {
    type Id = i64;
    type Draft = NewGuestInvitation;

    const TABLE: Table = Table::GuestInvitations;

    fn id(&self) -> i64 {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sentinel() -> i64 {
        0
    }

    fn assign_id(serial: i64) -> i64 {
        serial
    }

    fn materialize(id: i64, draft: NewGuestInvitation, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            guest_name: draft.guest_name,
            link: draft.link,
            created_at,
        }
    }
}

impl Row for RsvpMessage {
    type Id = Uuid;
    type Draft = NewRsvpMessage;

    const TABLE: Table = Table::RsvpMessages;

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sentinel() -> Uuid {
        Uuid::nil()
    }

    fn assign_id(_serial: i64) -> Uuid {
        Uuid::new_v4()
    }

    fn materialize(id: Uuid, draft: NewRsvpMessage, created_at: DateTime<Utc>) -> Self {
        let draft = draft.normalized();
        Self {
            id,
            guest_name: draft.guest_name,
            attendance: draft.attendance,
            guest_count: draft.guest_count,
            message: draft.message,
            created_at,
        }
    }
}

/// A change on a table, decoded into its row type
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange<T: Row> {
    Inserted(T),
    Updated(T),
    Deleted(T::Id),
    /// Wildcard delete: every row of the table is gone
    Cleared,
    /// The feed skipped changes; anything cached from it must be reloaded
    ///
    /// Raised locally by a subscription, never carried on the feed itself.
    Resync,
}

impl<T: Row> RowChange<T> {
    /// Decode a feed event
    ///
    /// Returns `Ok(None)` when the event belongs to another table.
    pub fn from_event(event: &ChangeEvent) -> Result<Option<Self>, serde_json::Error> {
        if event.table() != T::TABLE {
            return Ok(None);
        }

        let change = match event {
            ChangeEvent::Insert { new, .. } => RowChange::Inserted(serde_json::from_value(new.clone())?),
            ChangeEvent::Update { new, .. } => RowChange::Updated(serde_json::from_value(new.clone())?),
            ChangeEvent::Delete { id: Some(id), .. } => {
                RowChange::Deleted(serde_json::from_value(id.clone())?)
            }
            ChangeEvent::Delete { id: None, .. } => RowChange::Cleared,
        };

        Ok(Some(change))
    }

    /// Encode back into a feed event
    pub fn to_event(&self) -> Result<ChangeEvent, serde_json::Error> {
        let table = T::TABLE;
        Ok(match self {
            RowChange::Inserted(row) => ChangeEvent::Insert {
                table,
                new: serde_json::to_value(row)?,
            },
            RowChange::Updated(row) => ChangeEvent::Update {
                table,
                new: serde_json::to_value(row)?,
            },
            RowChange::Deleted(id) => ChangeEvent::Delete {
                table,
                id: Some(serde_json::to_value(id)?),
            },
            RowChange::Cleared => ChangeEvent::Delete { table, id: None },
            RowChange::Resync => {
                return Err(serde::ser::Error::custom(
                    "resync is raised by a subscription and has no feed event",
                ));
            }
        })
    }
}

/// Live change subscription on a single table
///
/// Yields every change after the subscription was opened. Dropping the
/// subscription (or calling [`close`](Self::close)) releases the feed.
pub struct Subscription<T: Row> {
    stream: BoxStream<'static, RowChange<T>>,
    reader: Option<AbortHandle>,
}

impl<T: Row> Subscription<T> {
    /// Wrap an arbitrary change stream
    pub fn from_stream(stream: impl Stream<Item = RowChange<T>> + Send + 'static) -> Self {
        Self {
            stream: stream.boxed(),
            reader: None,
        }
    }

    /// Attach the task feeding this subscription; it is aborted on close
    pub fn with_reader(mut self, reader: AbortHandle) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Subscribe to `T::TABLE` on an in-process event bus
    ///
    /// A receiver that falls behind the bus yields [`RowChange::Resync`] in
    /// place of the changes it missed.
    pub fn from_bus(bus: &EventBus) -> Self {
        let stream = BroadcastStream::new(bus.subscribe()).filter_map(|item| {
            let change = match item {
                Ok(envelope) => match RowChange::<T>::from_event(&envelope.event) {
                    Ok(change) => change,
                    Err(e) => {
                        tracing::warn!(
                            table = %T::TABLE,
                            error = %e,
                            "Dropping undecodable change event"
                        );
                        None
                    }
                },
                Err(BroadcastStreamRecvError::Lagged(count)) => {
                    tracing::warn!(
                        table = %T::TABLE,
                        count = count,
                        "Subscription lagged, {} events skipped",
                        count
                    );
                    Some(RowChange::Resync)
                }
            };
            futures::future::ready(change)
        });

        Self::from_stream(stream)
    }

    /// Wait for the next change; `None` once the feed is closed
    pub async fn next_change(&mut self) -> Option<RowChange<T>> {
        self.stream.next().await
    }

    /// Release the feed
    pub fn close(self) {}
}

impl<T: Row> Stream for Subscription<T> {
    type Item = RowChange<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl<T: Row> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
