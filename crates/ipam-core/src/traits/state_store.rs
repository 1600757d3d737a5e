// # State Store Trait
//
// Defines the interface for tracking managed containers between runs.
//
// ## Purpose
//
// For every resource name the store remembers:
// - The authority reference of the created object
// - The last synchronized container snapshot
// - Which attribute names the resource declared at its last apply
//
// The reference drives every Read/Update/Delete after creation. The declared
// attribute names let an update remove attributes the resource stopped
// declaring. The tracked references are also what destroy verification
// checks.
//
// ## Implementations
//
// - In-memory: `MemoryStateStore`
// - File-based JSON: `FileStateStore`

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::model::{NetworkContainer, ObjectRef};

/// Tracked state for one managed container
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackedContainer {
    /// Authority reference
    pub reference: ObjectRef,
    /// Last synchronized snapshot, as observed on the authority
    pub snapshot: NetworkContainer,
    /// Attribute names declared by the desired state at the last apply
    #[serde(default)]
    pub managed_attributes: BTreeSet<String>,
    /// Timestamp of the last synchronization
    pub last_synced: chrono::DateTime<chrono::Utc>,
}

impl TrackedContainer {
    /// Create a tracked record stamped with the current time
    pub fn new(
        reference: ObjectRef,
        snapshot: NetworkContainer,
        managed_attributes: BTreeSet<String>,
    ) -> Self {
        Self {
            reference,
            snapshot,
            managed_attributes,
            last_synced: chrono::Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Responsibilities
///
/// Stores persist what the `Reconciler` hands them. They never talk to the
/// authority and never decide whether a change is needed.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the tracked record for a resource
    async fn get(&self, name: &str) -> Result<Option<TrackedContainer>, crate::Error>;

    /// Create or replace the tracked record for a resource
    async fn put(&self, name: &str, record: &TrackedContainer) -> Result<(), crate::Error>;

    /// Forget a resource (no-op when it is not tracked)
    async fn remove(&self, name: &str) -> Result<(), crate::Error>;

    /// List all tracked resource names
    async fn list(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
