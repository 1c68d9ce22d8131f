//! Locally cached table contents kept current by the change feed

use crate::core::row::{Row, RowChange, Subscription};
use crate::core::service::RowService;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, watch};
use tokio::task::JoinHandle;

/// Newest-first cache of a table, optionally bounded
///
/// The list is a pure reducer over [`RowChange`]s: applying the same change
/// twice leaves it as after the first application, so an optimistic insert
/// followed by its echo never produces a duplicate row.
///
/// Ids are never reused, so once a row is seen deleted an insert carrying
/// its id is stale and ignored, whichever order the two arrive in.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveList<T: Row> {
    rows: Vec<T>,
    cap: Option<usize>,
    deleted: HashSet<T::Id>,
}

impl<T: Row> LiveList<T> {
    /// Unbounded list
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            cap: None,
            deleted: HashSet::new(),
        }
    }

    /// List keeping at most `cap` rows
    pub fn bounded(cap: usize) -> Self {
        Self {
            rows: Vec::new(),
            cap: Some(cap),
            deleted: HashSet::new(),
        }
    }

    /// Replace the contents with a fresh select (already newest first)
    pub fn replace_all(&mut self, rows: Vec<T>) {
        self.rows = rows;
        self.truncate();
    }

    /// Apply one change; returns whether the list changed
    pub fn apply(&mut self, change: RowChange<T>) -> bool {
        match change {
            RowChange::Inserted(row) => {
                if self.contains(row.id()) || self.deleted.contains(&row.id()) {
                    return false;
                }
                self.rows.insert(0, row);
                self.truncate();
                true
            }
            RowChange::Updated(row) => match self.rows.iter_mut().find(|r| r.id() == row.id()) {
                Some(existing) if *existing != row => {
                    *existing = row;
                    true
                }
                _ => false,
            },
            RowChange::Deleted(id) => {
                self.deleted.insert(id);
                let before = self.rows.len();
                self.rows.retain(|r| r.id() != id);
                self.rows.len() != before
            }
            RowChange::Cleared => {
                let changed = !self.rows.is_empty();
                self.deleted.extend(self.rows.drain(..).map(|r| r.id()));
                changed
            }
            // Reloading is up to whoever owns the source
            RowChange::Resync => false,
        }
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.rows.iter().any(|r| r.id() == id)
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.rows.iter().find(|r| r.id() == id)
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn truncate(&mut self) {
        if let Some(cap) = self.cap {
            self.rows.truncate(cap);
        }
    }
}

impl<T: Row> Default for LiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`LiveList`] shared between a page and the task following its feed
///
/// Every effective change bumps a revision counter so front ends know when
/// to render again.
pub struct SharedList<T: Row> {
    list: Arc<RwLock<LiveList<T>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl<T: Row> Clone for SharedList<T> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            revision: self.revision.clone(),
        }
    }
}

impl<T: Row> SharedList<T> {
    pub fn new(list: LiveList<T>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            list: Arc::new(RwLock::new(list)),
            revision: Arc::new(revision),
        }
    }

    pub async fn replace_all(&self, rows: Vec<T>) {
        self.list.write().await.replace_all(rows);
        self.bump();
    }

    pub async fn apply(&self, change: RowChange<T>) -> bool {
        let changed = self.list.write().await.apply(change);
        if changed {
            self.bump();
        }
        changed
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, LiveList<T>> {
        self.list.read().await
    }

    /// Copy of the current rows
    pub async fn snapshot(&self) -> Vec<T> {
        self.list.read().await.rows().to_vec()
    }

    /// Receiver notified after every effective change
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Apply every change of `subscription` until it ends
    ///
    /// When the subscription reports missed changes the list is reloaded
    /// with `source.select(limit)`. Aborting the returned task drops the
    /// subscription.
    pub fn follow(
        &self,
        mut subscription: Subscription<T>,
        source: Arc<dyn RowService<T>>,
        limit: Option<usize>,
    ) -> JoinHandle<()> {
        let list = self.clone();
        tokio::spawn(async move {
            while let Some(change) = subscription.next_change().await {
                match change {
                    RowChange::Resync => match source.select(limit).await {
                        Ok(rows) => {
                            tracing::debug!(table = %T::TABLE, rows = rows.len(), "reloaded after missed changes");
                            list.replace_all(rows).await;
                        }
                        Err(e) => {
                            tracing::warn!(table = %T::TABLE, error = %e, "reload after missed changes failed");
                        }
                    },
                    change => {
                        list.apply(change).await;
                    }
                }
            }
            tracing::debug!(table = %T::TABLE, "change feed ended");
        })
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}
