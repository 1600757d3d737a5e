// # ipam-core
//
// Core library for reconciling IPAM network containers.
//
// ## Architecture Overview
//
// This library provides the core functionality for managing IPv4 and IPv6
// network containers and their extensible attributes (EAs):
// - **ea**: EA value model, wire codec and collapse-tolerant differ
// - **model**: Network containers, object types and references
// - **Connector**: Trait for talking to the IPAM authority
// - **StateStore**: Trait for remembering which containers we manage
// - **Reconciler**: Core engine that turns desired state into remote calls
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from the wire client
// 2. **Validate Early**: Bad prefixes and immutable changes never reach the authority
// 3. **Collapse Tolerance**: A one-element list and its scalar are the same value
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Applying the same desired state twice sends nothing the second time

pub mod config;
pub mod ea;
pub mod engine;
pub mod error;
pub mod model;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ConnectorConfig, ContainerSpec, EngineConfig, StateStoreConfig, SyncConfig};
pub use ea::{AttributeMap, AttributeValue, DiffMode, Scalar};
pub use engine::{
    ApplyOutcome, EngineEvent, LifecycleState, Plan, Reconciler, VerificationCondition,
    VerificationReport,
};
pub use error::{Error, Operation, Result};
pub use model::{NetworkContainer, NetworkFamily, ObjectRef, ObjectType};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{Connector, ConnectorError, StateStore};
