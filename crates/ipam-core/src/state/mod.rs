// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::config::StateStoreConfig;
use crate::error::Result;
use crate::traits::StateStore;

/// Build the state store described by the configuration
pub async fn from_config(config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
    match config {
        StateStoreConfig::Memory => Ok(Box::new(MemoryStateStore::new())),
        StateStoreConfig::File { path } => Ok(Box::new(FileStateStore::new(path).await?)),
    }
}
