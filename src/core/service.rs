//! Service traits for the table store

use crate::core::events::EventBus;
use crate::core::model::{GuestInvitation, RsvpMessage};
use crate::core::row::{Row, Subscription};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// CRUD plus change subscription on one table
///
/// Implementations provide the operations the pages and the REST exposure
/// rely on. The framework is agnostic to the underlying storage mechanism;
/// every successful mutation must be reflected on the change feed.
#[async_trait]
pub trait RowService<T: Row>: Send + Sync {
    /// Rows ordered newest first, optionally limited
    async fn select(&self, limit: Option<usize>) -> Result<Vec<T>>;

    /// Insert a row; identity and `created_at` are assigned by the store
    async fn insert(&self, draft: T::Draft) -> Result<T>;

    /// Delete a row by identity (deleting an absent row is not an error)
    async fn delete(&self, id: T::Id) -> Result<()>;

    /// Delete every row whose identity differs from `sentinel`
    ///
    /// Returns the number of rows removed.
    async fn delete_all_except(&self, sentinel: T::Id) -> Result<u64>;

    /// Open a change subscription on this table
    async fn subscribe(&self) -> Result<Subscription<T>>;
}

/// The table store as seen by the pages
#[derive(Clone)]
pub struct Backend {
    pub invitations: Arc<dyn RowService<GuestInvitation>>,
    pub messages: Arc<dyn RowService<RsvpMessage>>,
}

impl Backend {
    pub fn new(
        invitations: Arc<dyn RowService<GuestInvitation>>,
        messages: Arc<dyn RowService<RsvpMessage>>,
    ) -> Self {
        Self {
            invitations,
            messages,
        }
    }

    /// Both tables in memory, publishing to `event_bus`
    #[cfg(feature = "in-memory")]
    pub fn in_memory(event_bus: EventBus) -> Self {
        use crate::storage::InMemoryRowService;

        Self {
            invitations: Arc::new(InMemoryRowService::<GuestInvitation>::new(
                event_bus.clone(),
            )),
            messages: Arc::new(InMemoryRowService::<RsvpMessage>::new(event_bus)),
        }
    }
}
