//! Network container object model
//!
//! A [`NetworkContainer`] is a CIDR block registered in a network view. The
//! address family selects the remote object type and the validation rules.
//! Construction validates everything that can be checked locally, so a bad
//! prefix or a family mismatch never reaches the authority.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ea::AttributeMap;
use crate::error::{Error, Result};

/// Address family of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkFamily {
    /// IPv4 prefix
    V4,
    /// IPv6 prefix
    V6,
}

impl NetworkFamily {
    /// Remote object type for this family
    pub fn object_type(self) -> ObjectType {
        match self {
            NetworkFamily::V4 => ObjectType::Ipv4NetworkContainer,
            NetworkFamily::V6 => ObjectType::Ipv6NetworkContainer,
        }
    }
}

impl fmt::Display for NetworkFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkFamily::V4 => f.write_str("IPv4"),
            NetworkFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Remote object types managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// `ipv4_network_container`
    Ipv4NetworkContainer,
    /// `ipv6_network_container`
    Ipv6NetworkContainer,
}

impl ObjectType {
    /// Resource type name exposed to the declarative front end
    pub fn resource_name(self) -> &'static str {
        match self {
            ObjectType::Ipv4NetworkContainer => "ipv4_network_container",
            ObjectType::Ipv6NetworkContainer => "ipv6_network_container",
        }
    }

    /// Object type name on the WAPI protocol
    pub fn wapi_name(self) -> &'static str {
        match self {
            ObjectType::Ipv4NetworkContainer => "networkcontainer",
            ObjectType::Ipv6NetworkContainer => "ipv6networkcontainer",
        }
    }

    /// Look up an object type by its WAPI name
    pub fn from_wapi_name(name: &str) -> Option<Self> {
        match name {
            "networkcontainer" => Some(ObjectType::Ipv4NetworkContainer),
            "ipv6networkcontainer" => Some(ObjectType::Ipv6NetworkContainer),
            _ => None,
        }
    }

    /// Address family of this object type
    pub fn family(self) -> NetworkFamily {
        match self {
            ObjectType::Ipv4NetworkContainer => NetworkFamily::V4,
            ObjectType::Ipv6NetworkContainer => NetworkFamily::V6,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

/// Opaque reference assigned by the authority
///
/// WAPI references look like
/// `networkcontainer/ZG5zLm5ldHdvcmtfY29udGFpbmVy:10.0.0.0/16/default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(String);

impl ObjectRef {
    /// Wrap a reference string returned by the authority
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The raw reference string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object type encoded in the reference prefix, if recognised
    pub fn object_type(&self) -> Option<ObjectType> {
        self.0
            .split_once('/')
            .and_then(|(prefix, _)| ObjectType::from_wapi_name(prefix))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A network container, desired or observed
///
/// Deserialization goes through the same checks as [`NetworkContainer::new`],
/// except for list element kinds, which observed attributes may mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredContainer")]
pub struct NetworkContainer {
    family: NetworkFamily,
    network_view: String,
    cidr: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<ObjectRef>,
}

impl NetworkContainer {
    /// Build and validate a container from desired state
    ///
    /// The CIDR is stored in canonical form.
    pub fn new(
        family: NetworkFamily,
        network_view: impl Into<String>,
        cidr: &str,
        comment: impl Into<String>,
        attributes: AttributeMap,
    ) -> Result<Self> {
        let network_view = network_view.into();
        if network_view.trim().is_empty() {
            return Err(Error::validation("network view cannot be empty"));
        }

        let cidr = parse_cidr(family, cidr)?;
        validate_attributes(&attributes)?;

        Ok(Self {
            family,
            network_view,
            cidr,
            comment: comment.into(),
            attributes,
            reference: None,
        })
    }

    /// Build a container from fields reported by the authority
    ///
    /// The authority's values are taken as they are; only the reference
    /// is required.
    pub(crate) fn observed(
        family: NetworkFamily,
        network_view: String,
        cidr: String,
        comment: String,
        attributes: AttributeMap,
        reference: ObjectRef,
    ) -> Self {
        Self {
            family,
            network_view,
            cidr,
            comment,
            attributes,
            reference: Some(reference),
        }
    }

    /// Address family
    pub fn family(&self) -> NetworkFamily {
        self.family
    }

    /// Remote object type
    pub fn object_type(&self) -> ObjectType {
        self.family.object_type()
    }

    /// Network view name
    pub fn network_view(&self) -> &str {
        &self.network_view
    }

    /// Canonical CIDR
    pub fn cidr(&self) -> &str {
        &self.cidr
    }

    /// Comment, empty when unset
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Extensible attributes
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Authority reference, set once the container has been created
    pub fn reference(&self) -> Option<&ObjectRef> {
        self.reference.as_ref()
    }

    pub(crate) fn set_reference(&mut self, reference: ObjectRef) {
        self.reference = Some(reference);
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

/// Serialized form of a [`NetworkContainer`], validated on the way in
#[derive(Deserialize)]
struct StoredContainer {
    family: NetworkFamily,
    network_view: String,
    cidr: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default)]
    reference: Option<ObjectRef>,
}

impl TryFrom<StoredContainer> for NetworkContainer {
    type Error = Error;

    fn try_from(stored: StoredContainer) -> Result<Self> {
        if stored.network_view.trim().is_empty() {
            return Err(Error::validation("network view cannot be empty"));
        }
        if stored.attributes.keys().any(|name| name.trim().is_empty()) {
            return Err(Error::validation("attribute name cannot be empty"));
        }

        Ok(Self {
            family: stored.family,
            cidr: parse_cidr(stored.family, &stored.cidr)?,
            network_view: stored.network_view,
            comment: stored.comment,
            attributes: stored.attributes,
            reference: stored.reference,
        })
    }
}

/// Parse a prefix of the given family into canonical form
///
/// Host bits must be zero: `10.0.0.1/16` is rejected rather than silently
/// truncated.
pub fn parse_cidr(family: NetworkFamily, cidr: &str) -> Result<String> {
    let net: IpNet = cidr
        .trim()
        .parse()
        .map_err(|e| Error::validation(format!("invalid CIDR '{}': {}", cidr, e)))?;

    let actual = match net {
        IpNet::V4(_) => NetworkFamily::V4,
        IpNet::V6(_) => NetworkFamily::V6,
    };
    if actual != family {
        return Err(Error::validation(format!(
            "CIDR '{}' is {} but the {} container requires {}",
            cidr,
            actual,
            family.object_type(),
            family
        )));
    }

    if net.trunc() != net {
        return Err(Error::validation(format!(
            "CIDR '{}' has host bits set; did you mean '{}'?",
            cidr,
            net.trunc()
        )));
    }

    Ok(net.to_string())
}

fn validate_attributes(attributes: &AttributeMap) -> Result<()> {
    for (name, value) in attributes {
        if name.trim().is_empty() {
            return Err(Error::validation("attribute name cannot be empty"));
        }
        value.validate(name).map_err(Error::validation)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ea::{AttributeValue, Scalar};

    #[test]
    fn test_valid_containers() {
        let v4 = NetworkContainer::new(
            NetworkFamily::V4,
            "default",
            "10.0.0.0/16",
            "10.0.0.0/16 network container",
            AttributeMap::new(),
        )
        .unwrap();
        assert_eq!(v4.cidr(), "10.0.0.0/16");
        assert_eq!(v4.object_type(), ObjectType::Ipv4NetworkContainer);
        assert!(v4.reference().is_none());

        let v6 = NetworkContainer::new(
            NetworkFamily::V6,
            "default",
            "FC00:0::/56",
            "",
            AttributeMap::new(),
        )
        .unwrap();
        assert_eq!(v6.cidr(), "fc00::/56");
        assert_eq!(v6.object_type().wapi_name(), "ipv6networkcontainer");
    }

    #[test]
    fn test_family_mismatch_is_validation_error() {
        let err = NetworkContainer::new(
            NetworkFamily::V4,
            "default",
            "fc00::/56",
            "",
            AttributeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = parse_cidr(NetworkFamily::V6, "10.0.0.0/16").unwrap_err();
        assert!(err.to_string().contains("ipv6_network_container"));
    }

    #[test]
    fn test_bad_prefixes() {
        assert!(parse_cidr(NetworkFamily::V4, "10.0.0.0").is_err());
        assert!(parse_cidr(NetworkFamily::V4, "10.0.0.0/33").is_err());
        assert!(parse_cidr(NetworkFamily::V4, "10.0.0.1/16").is_err());
        assert!(parse_cidr(NetworkFamily::V4, "not a network").is_err());
    }

    #[test]
    fn test_empty_view_and_attribute_name() {
        let err =
            NetworkContainer::new(NetworkFamily::V4, " ", "10.0.0.0/16", "", AttributeMap::new())
                .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let mut attrs = AttributeMap::new();
        attrs.insert(String::new(), "x".into());
        assert!(
            NetworkContainer::new(NetworkFamily::V4, "default", "10.0.0.0/16", "", attrs).is_err()
        );
    }

    #[test]
    fn test_mixed_list_attribute_rejected() {
        let mut attrs = AttributeMap::new();
        attrs.insert(
            "TestEA".into(),
            AttributeValue::List(vec![Scalar::from(1), Scalar::from("one")]),
        );
        assert!(
            NetworkContainer::new(NetworkFamily::V4, "default", "10.0.0.0/16", "", attrs).is_err()
        );
    }

    #[test]
    fn test_object_ref_type_prefix() {
        let r = ObjectRef::new("ipv6networkcontainer/ZG5z:fc00%3A%3A/56/default");
        assert_eq!(r.object_type(), Some(ObjectType::Ipv6NetworkContainer));
        assert_eq!(ObjectRef::new("record:a/xyz").object_type(), None);
        assert_eq!(ObjectRef::new("garbage").object_type(), None);
    }

    #[test]
    fn test_deserialization_validates() {
        let stored: NetworkContainer = serde_json::from_value(serde_json::json!({
            "family": "v6",
            "network_view": "default",
            "cidr": "FC00:0::/56",
            "reference": "ipv6networkcontainer/ZG5z:fc00::/56/default"
        }))
        .unwrap();
        assert_eq!(stored.cidr(), "fc00::/56");
        assert!(stored.reference().is_some());

        let bad = [
            serde_json::json!({"family": "v4", "network_view": "default", "cidr": "fc00::/56"}),
            serde_json::json!({"family": "v4", "network_view": "default", "cidr": "10.0.0.1/16"}),
            serde_json::json!({"family": "v4", "network_view": " ", "cidr": "10.0.0.0/16"}),
            serde_json::json!({
                "family": "v4",
                "network_view": "default",
                "cidr": "10.0.0.0/16",
                "attributes": {"": "x"}
            }),
        ];
        for value in bad {
            assert!(serde_json::from_value::<NetworkContainer>(value).is_err());
        }
    }
}
