//! Extensible attribute values
//!
//! An attribute value is either a single [`Scalar`] or a list of scalars of
//! one kind. Integers are the canonical numeric form: a JSON integer is
//! always an [`Scalar::Int`] and a JSON string is always a [`Scalar::Text`],
//! with no coercion between the two.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute name to value mapping
///
/// Ordered so that payloads and log lines are deterministic.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// A single attribute element
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer value
    Int(i64),
    /// String value
    Text(String),
}

impl Scalar {
    /// Kind name used in validation messages
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Int(_) => "integer",
            Scalar::Text(_) => "string",
        }
    }

    /// Whether two scalars are of the same kind
    pub fn same_kind(&self, other: &Scalar) -> bool {
        matches!(
            (self, other),
            (Scalar::Int(_), Scalar::Int(_)) | (Scalar::Text(_), Scalar::Text(_))
        )
    }

    fn is_empty(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// Value of one extensible attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Single value
    Scalar(Scalar),
    /// Multi-value attribute
    List(Vec<Scalar>),
}

impl AttributeValue {
    /// Build a list value from anything convertible to scalars
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        AttributeValue::List(items.into_iter().map(Into::into).collect())
    }

    /// An empty string or an empty list
    ///
    /// As a desired value this means "clear the attribute"; the authority
    /// cannot store either form.
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Scalar(s) => s.is_empty(),
            AttributeValue::List(items) => items.is_empty(),
        }
    }

    /// The single element of a scalar or a one-element list
    pub fn single(&self) -> Option<&Scalar> {
        match self {
            AttributeValue::Scalar(s) => Some(s),
            AttributeValue::List(items) if items.len() == 1 => items.first(),
            AttributeValue::List(_) => None,
        }
    }

    /// Check that list elements share one kind
    pub fn validate(&self, name: &str) -> Result<(), String> {
        if let AttributeValue::List(items) = self
            && let Some(first) = items.first()
            && let Some(odd) = items.iter().find(|item| !item.same_kind(first))
        {
            return Err(format!(
                "attribute '{}' mixes {} and {} elements",
                name,
                first.kind(),
                odd.kind()
            ));
        }
        Ok(())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Scalar(s) => write!(f, "{}", s),
            AttributeValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<Scalar> for AttributeValue {
    fn from(value: Scalar) -> Self {
        AttributeValue::Scalar(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Scalar(Scalar::Int(value))
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Scalar(Scalar::from(value))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Scalar(Scalar::from(value))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Scalar(Scalar::Text(value))
    }
}
