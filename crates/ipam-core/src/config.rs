//! Configuration types for the reconciliation engine
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ea::{AttributeMap, DiffMode};
use crate::model::{NetworkContainer, NetworkFamily};

/// Attribute the authority uses to tag objects with their owning tenant
pub const TENANT_ID_ATTRIBUTE: &str = "Tenant ID";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Connection to the IPAM authority
    pub connector: ConnectorConfig,

    /// Where tracked containers are remembered
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Desired containers
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.connector.validate()?;
        self.engine.validate()?;

        let mut seen = HashSet::new();
        for spec in &self.containers {
            if spec.name.trim().is_empty() {
                return Err(crate::Error::config("Container name cannot be empty"));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Container name '{}' is declared more than once",
                    spec.name
                )));
            }
            spec.to_container()
                .map_err(|e| crate::Error::config(format!("Container '{}': {}", spec.name, e)))?;
        }

        Ok(())
    }
}

/// IPAM authority connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorConfig {
    /// Infoblox WAPI over HTTPS
    Wapi {
        /// Grid master host name or address
        host: String,
        /// WAPI user
        username: String,
        /// WAPI password
        password: String,
        /// WAPI version, e.g. "2.12"
        #[serde(default = "default_wapi_version")]
        version: String,
        /// Verify the server certificate
        #[serde(default = "default_verify_tls")]
        verify_tls: bool,
        /// Request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        /// Perform reads but only log writes
        #[serde(default)]
        dry_run: bool,
    },
}

impl ConnectorConfig {
    /// Validate the connector configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ConnectorConfig::Wapi {
                host,
                username,
                password,
                version,
                timeout_secs,
                ..
            } => {
                if host.is_empty() {
                    return Err(crate::Error::config("WAPI host cannot be empty"));
                }
                if host.contains('/') {
                    return Err(crate::Error::config(
                        "WAPI host must be a host name, not a URL",
                    ));
                }
                if username.is_empty() || password.is_empty() {
                    return Err(crate::Error::config("WAPI credentials cannot be empty"));
                }
                if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.')
                {
                    return Err(crate::Error::config(format!(
                        "WAPI version '{}' is not valid",
                        version
                    )));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("WAPI timeout must be > 0"));
                }
                Ok(())
            }
        }
    }

    /// Get the connector type name
    pub fn type_name(&self) -> &str {
        match self {
            ConnectorConfig::Wapi { .. } => "wapi",
        }
    }
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorConfig::Wapi {
                host,
                username,
                version,
                verify_tls,
                timeout_secs,
                dry_run,
                ..
            } => f
                .debug_struct("Wapi")
                .field("host", host)
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("version", version)
                .field("verify_tls", verify_tls)
                .field("timeout_secs", timeout_secs)
                .field("dry_run", dry_run)
                .finish(),
        }
    }
}

fn default_wapi_version() -> String {
    "2.12".to_string()
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Treatment of remote attributes the desired state does not declare
    #[serde(default)]
    pub diff_mode: DiffMode,

    /// Tenant written as the `Tenant ID` attribute on create
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Attributes owned outside the declared resources
    ///
    /// These are never removed by an update and never count as drift in
    /// exclusive mode.
    #[serde(default = "default_retained_attributes")]
    pub retained_attributes: Vec<String>,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self.tenant_id.as_deref().is_some_and(str::is_empty) {
            return Err(crate::Error::config("Tenant ID cannot be empty when set"));
        }
        if self.retained_attributes.iter().any(|name| name.trim().is_empty()) {
            return Err(crate::Error::config("Retained attribute names cannot be empty"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            diff_mode: DiffMode::default(),
            tenant_id: None,
            retained_attributes: default_retained_attributes(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_retained_attributes() -> Vec<String> {
    vec![TENANT_ID_ATTRIBUTE.to_string()]
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// One desired network container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Resource name, unique within the configuration
    pub name: String,

    /// Address family
    pub family: NetworkFamily,

    /// Network view
    #[serde(default = "default_network_view")]
    pub network_view: String,

    /// Network prefix
    pub cidr: String,

    /// Free-text comment
    #[serde(default)]
    pub comment: String,

    /// Extensible attributes
    #[serde(default)]
    pub attributes: AttributeMap,
}

impl ContainerSpec {
    /// Build the validated desired container
    pub fn to_container(&self) -> Result<NetworkContainer, crate::Error> {
        NetworkContainer::new(
            self.family,
            self.network_view.clone(),
            &self.cidr,
            self.comment.clone(),
            self.attributes.clone(),
        )
    }
}

fn default_network_view() -> String {
    "default".to_string()
}
