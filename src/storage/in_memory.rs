//! In-memory implementation of RowService for tests and single-node deployments

use crate::core::events::EventBus;
use crate::core::row::{Row, RowChange, Subscription};
use crate::core::service::RowService;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, RwLock};

/// In-memory table
///
/// Rows are kept newest first. Uses RwLock for thread-safe access and
/// publishes every mutation on the shared [`EventBus`] before the write lock
/// is released, so the feed order matches the stored order.
#[derive(Clone)]
pub struct InMemoryRowService<T: Row> {
    rows: Arc<RwLock<Table<T>>>,
    event_bus: EventBus,
}

struct Table<T> {
    rows: Vec<T>,
    serial: i64,
}

impl<T: Row> InMemoryRowService<T> {
    /// Create an empty table publishing to `event_bus`
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            rows: Arc::new(RwLock::new(Table {
                rows: Vec::new(),
                serial: 0,
            })),
            event_bus,
        }
    }

    fn publish(&self, change: RowChange<T>) {
        match change.to_event() {
            Ok(event) => {
                self.event_bus.publish(event);
            }
            Err(e) => {
                tracing::error!(table = %T::TABLE, error = %e, "Failed to encode change event");
            }
        }
    }
}

#[async_trait]
impl<T: Row> RowService<T> for InMemoryRowService<T> {
    async fn select(&self, limit: Option<usize>) -> Result<Vec<T>> {
        let table = self
            .rows
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let take = limit.unwrap_or(table.rows.len());
        Ok(table.rows.iter().take(take).cloned().collect())
    }

    async fn insert(&self, draft: T::Draft) -> Result<T> {
        let mut table = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        table.serial += 1;
        let row = T::materialize(T::assign_id(table.serial), draft, Utc::now());
        table.rows.insert(0, row.clone());

        tracing::debug!(table = %T::TABLE, id = %row.id(), "row inserted");
        self.publish(RowChange::Inserted(row.clone()));

        Ok(row)
    }

    async fn delete(&self, id: T::Id) -> Result<()> {
        let mut table = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let before = table.rows.len();
        table.rows.retain(|row| row.id() != id);

        if table.rows.len() < before {
            tracing::debug!(table = %T::TABLE, id = %id, "row deleted");
            self.publish(RowChange::Deleted(id));
        }

        Ok(())
    }

    async fn delete_all_except(&self, sentinel: T::Id) -> Result<u64> {
        let mut table = self
            .rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let before = table.rows.len();
        table.rows.retain(|row| row.id() == sentinel);
        let removed = (before - table.rows.len()) as u64;

        if removed > 0 {
            tracing::info!(table = %T::TABLE, removed = removed, "table cleared");
            // One wildcard event instead of one event per row
            self.publish(RowChange::Cleared);
        }

        Ok(removed)
    }

    async fn subscribe(&self) -> Result<Subscription<T>> {
        Ok(Subscription::from_bus(&self.event_bus))
    }
}
