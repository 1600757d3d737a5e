// # Connector Trait
//
// Defines the interface to the remote IPAM authority.
//
// ## Implementations
//
// - Infoblox WAPI: `ipam-connector-wapi` crate
//
// ## Usage
//
// ```rust,ignore
// use ipam_core::traits::{Connector, ContainerFields};
// use ipam_core::model::ObjectType;
//
// let fields = ContainerFields {
//     network_view: Some("default".into()),
//     network: Some("10.0.0.0/16".into()),
//     ..Default::default()
// };
// let reference = connector.create(ObjectType::Ipv4NetworkContainer, &fields).await?;
// let observed = connector.get(&reference).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ea::WireAttributeMap;
use crate::model::{ObjectRef, ObjectType};

/// Object fields exchanged with the authority
///
/// Field names follow WAPI. Unset fields are left out of request bodies, so
/// an update carries only what changed. `extattrs+` and `extattrs-` add or
/// remove individual attributes without replacing the whole set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_view: Option<String>,

    /// CIDR of the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Full attribute set (create payloads and read responses)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extattrs: Option<WireAttributeMap>,

    /// Attributes to add or overwrite on update
    #[serde(
        rename = "extattrs+",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extattrs_add: Option<WireAttributeMap>,

    /// Attributes to delete on update
    #[serde(
        rename = "extattrs-",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extattrs_remove: Option<WireAttributeMap>,
}

impl ContainerFields {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.network_view.is_none()
            && self.network.is_none()
            && self.comment.is_none()
            && self.extattrs.is_none()
            && self.extattrs_add.is_none()
            && self.extattrs_remove.is_none()
    }
}

/// Failure reported by a connector
///
/// `NotFound` is authoritative: the object does not exist. Every other
/// variant says nothing about object state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// The authority reports no such object
    #[error("not found: {0}")]
    NotFound(String),

    /// The authority already holds an equivalent object
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network, authentication or server failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request did not complete in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// The response could not be interpreted
    ///
    /// Includes responses that report an error and carry object data at
    /// the same time.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Trait for IPAM authority connectors
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// A connector performs exactly one remote request per call and maps the
/// response onto [`ConnectorError`]. It does not retry, back off, cache, or
/// decide whether a change is needed; all of that belongs to the
/// `Reconciler` or its caller. A timeout must be reported as
/// [`ConnectorError::Timeout`], never as `NotFound`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Create an object and return its reference
    ///
    /// Returns `Conflict` when the authority already holds the network.
    async fn create(
        &self,
        object_type: ObjectType,
        fields: &ContainerFields,
    ) -> Result<ObjectRef, ConnectorError>;

    /// Fetch an object by reference
    ///
    /// The response carries `network_view`, `network`, `comment` and
    /// `extattrs`.
    async fn get(&self, reference: &ObjectRef) -> Result<ContainerFields, ConnectorError>;

    /// Apply a partial update and return the (possibly new) reference
    async fn update(
        &self,
        reference: &ObjectRef,
        fields: &ContainerFields,
    ) -> Result<ObjectRef, ConnectorError>;

    /// Delete an object by reference
    async fn delete(&self, reference: &ObjectRef) -> Result<ObjectRef, ConnectorError>;

    /// Connector name (for logging/debugging)
    fn connector_name(&self) -> &'static str;
}

/// Helper trait for constructing connectors from configuration
pub trait ConnectorFactory: Send + Sync {
    /// Create a Connector instance from configuration
    fn create(
        &self,
        config: &crate::config::ConnectorConfig,
    ) -> Result<Box<dyn Connector>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_payload_omits_unset_fields() {
        let mut add = WireAttributeMap::new();
        add.insert("Site".into(), json!({ "value": "Test site" }));
        let mut remove = WireAttributeMap::new();
        remove.insert("TestEA1".into(), json!({}));

        let fields = ContainerFields {
            comment: Some(String::new()),
            extattrs_add: Some(add),
            extattrs_remove: Some(remove),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({
                "comment": "",
                "extattrs+": { "Site": { "value": "Test site" } },
                "extattrs-": { "TestEA1": {} }
            })
        );
    }

    #[test]
    fn test_read_response_ignores_unknown_fields() {
        let fields: ContainerFields = serde_json::from_value(json!({
            "_ref": "networkcontainer/ZG5z:10.0.0.0/16/default",
            "network": "10.0.0.0/16",
            "network_view": "default",
            "extattrs": {}
        }))
        .unwrap();

        assert_eq!(fields.network.as_deref(), Some("10.0.0.0/16"));
        assert!(fields.comment.is_none());
        assert!(ContainerFields::default().is_empty());
        assert!(!fields.is_empty());
    }
}
