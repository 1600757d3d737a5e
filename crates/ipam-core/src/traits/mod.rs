//! Core traits for the reconciliation engine
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Connector`]: Create/read/update/delete objects on the IPAM authority
//! - [`StateStore`]: Track managed containers between runs

pub mod connector;
pub mod state_store;

pub use connector::{Connector, ConnectorError, ConnectorFactory, ContainerFields};
pub use state_store::{StateStore, TrackedContainer};
