//! Error types for the IPAM reconciliation core
//!
//! Validation and immutable-field errors are raised before any remote call.
//! `Absent` is terminal (never retried) and is swallowed by delete.
//! `Transport` is the only retryable kind and is never interpreted as
//! object state.

use thiserror::Error;

use crate::model::ObjectRef;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Remote operation being attempted when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Core error type for the reconciliation engine
#[derive(Error, Debug)]
pub enum Error {
    /// Desired state failed local validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The authority already holds an object for this network
    #[error("Conflict: {object_type} {network} already exists")]
    Conflict {
        /// Remote object type name
        object_type: String,
        /// CIDR of the conflicting object
        network: String,
    },

    /// The object does not exist on the authority
    #[error("Object not found: {reference}")]
    Absent {
        /// Reference that was looked up
        reference: ObjectRef,
    },

    /// An immutable field differs between tracked and desired state
    #[error("Immutable field '{field}' cannot change from '{from}' to '{to}'; recreate the object")]
    ImmutableFieldChange {
        /// Field name (`cidr` or `network_view`)
        field: &'static str,
        /// Current value
        from: String,
        /// Requested value
        to: String,
    },

    /// Network, authentication, timeout or unexpected-response failure
    #[error("Transport error during {operation}{}: {message}", fmt_ref(.reference))]
    Transport {
        /// Operation being attempted
        operation: Operation,
        /// Object reference, when one was involved
        reference: Option<ObjectRef>,
        /// Underlying failure
        message: String,
    },

    /// A container was created but its reference could not be recorded
    #[error("Created {reference} but could not track it: {message}{}", fmt_cleanup(.deleted))]
    Untracked {
        /// Reference returned by the create
        reference: ObjectRef,
        /// Whether the compensating delete removed the object again
        deleted: bool,
        /// State store failure
        message: String,
    },

    /// Destroy verification found objects that still resolve
    #[error("Destroy verification failed: {0}")]
    VerificationFailed(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn fmt_ref(reference: &Option<ObjectRef>) -> String {
    match reference {
        Some(r) => format!(" of {}", r),
        None => String::new(),
    }
}

fn fmt_cleanup(deleted: &bool) -> &'static str {
    if *deleted {
        "; the object was deleted again"
    } else {
        "; the object remains on the authority and must be removed by hand"
    }
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transport error
    pub fn transport(
        operation: Operation,
        reference: Option<&ObjectRef>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            operation,
            reference: reference.cloned(),
            message: message.into(),
        }
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures the caller may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// True when the authority reported the object as missing
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
