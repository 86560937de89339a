//! Keyed storage abstraction and per-entity locking
//!
//! Components never own a process-wide map. They are handed a
//! [`Repository`] (in-memory by default, an external store in production)
//! and serialize writes to one entity through [`KeyedLocks`], so unrelated
//! ids never contend on the same lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::Result;

/// Keyed store of entities (trackers, patterns, A/B tests, guidelines)
#[async_trait]
pub trait Repository<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Fetch an entity by id
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// Insert or replace an entity
    async fn put(&self, id: &str, value: T) -> Result<()>;

    /// Remove an entity, returning the previous value
    async fn remove(&self, id: &str) -> Result<Option<T>>;

    /// Snapshot of every stored entity (no ordering guarantee)
    async fn list(&self) -> Result<Vec<T>>;
}

/// In-process repository backed by a shared map
pub struct InMemoryRepository<T> {
    entries: Arc<RwLock<HashMap<String, T>>>,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored entities
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[async_trait]
impl<T> Repository<T> for InMemoryRepository<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<T>> {
        let entries = self.entries.read().await;
        Ok(entries.get(id).cloned())
    }

    async fn put(&self, id: &str, value: T) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(id.to_string(), value);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<Option<T>> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(id))
    }

    async fn list(&self) -> Result<Vec<T>> {
        let entries = self.entries.read().await;
        Ok(entries.values().cloned().collect())
    }
}

/// Arena of per-id exclusive locks
///
/// Holding the guard returned by [`KeyedLocks::lock`] gives the caller sole
/// write access to that id for a read-modify-write against a repository.
/// Readers do not take these locks.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        entry.lock_owned().await
    }

    /// Drop the lock slot for an id that no longer exists
    pub async fn forget(&self, id: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(slot) = locks.get(id) {
            // Only drop idle slots; a holder keeps its own Arc alive.
            if Arc::strong_count(slot) == 1 {
                locks.remove(id);
                debug!("Released lock slot for {}", id);
            }
        }
    }

    /// Number of ids that currently have a lock slot
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
