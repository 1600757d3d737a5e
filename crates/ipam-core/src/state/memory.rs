// # Memory State Store
//
// In-memory implementation of StateStore.
//
// Nothing survives a restart: after one, every container is untracked and the
// next apply tries to create it again, which the authority rejects as a
// conflict. Suited to tests and one-shot runs that create and destroy in the
// same process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateStore, TrackedContainer};

/// In-memory state store implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, TrackedContainer>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of tracked containers
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, name: &str) -> Result<Option<TrackedContainer>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(name).cloned())
    }

    async fn put(&self, name: &str, record: &TrackedContainer) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(name.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
