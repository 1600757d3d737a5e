// # EA Codec
//
// Converts between [`AttributeMap`] and the authority's `extattrs` encoding:
//
// ```json
// {
//   "Location": { "value": "Test loc." },
//   "TestEA1":  { "value": ["text1", "text2"] },
//   "TestEA2":  { "value": [4, 5] }
// }
// ```
//
// The authority stores a one-element list as a bare scalar. Encoding does not
// pre-collapse; decoding reports whatever the wire holds, so a collapsed
// attribute comes back as `Scalar`. Reconciling the two forms is the job of
// the differ, not the codec.

use serde_json::{Map, Value};
use thiserror::Error;

use super::value::{AttributeMap, AttributeValue, Scalar};

/// Wire form of an extensible attribute map
pub type WireAttributeMap = Map<String, Value>;

/// Key holding the attribute payload inside each wire entry
const VALUE_KEY: &str = "value";

/// Errors raised while decoding attributes from the wire
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The entry for an attribute is not a JSON object
    #[error("attribute '{name}' is not an object: {found}")]
    NotAnObject { name: String, found: String },

    /// The value has a JSON type attributes cannot hold
    #[error("attribute '{name}' has unsupported value {found}")]
    UnsupportedValue { name: String, found: String },

    /// The number is not representable as a 64-bit integer
    #[error("attribute '{name}' has non-integer number {found}")]
    NonIntegerNumber { name: String, found: String },
}

/// Encode attributes for a create or `extattrs+` payload
///
/// Empty values are skipped; clearing an attribute is a removal, see
/// [`encode_removals`].
pub fn encode(attributes: &AttributeMap) -> WireAttributeMap {
    attributes
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| {
            let mut entry = Map::new();
            entry.insert(VALUE_KEY.to_string(), encode_value(value));
            (name.clone(), Value::Object(entry))
        })
        .collect()
}

/// Encode attribute names for an `extattrs-` payload
pub fn encode_removals<'a, I>(names: I) -> WireAttributeMap
where
    I: IntoIterator<Item = &'a String>,
{
    names
        .into_iter()
        .map(|name| (name.clone(), Value::Object(Map::new())))
        .collect()
}

fn encode_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Scalar(scalar) => encode_scalar(scalar),
        AttributeValue::List(items) => Value::Array(items.iter().map(encode_scalar).collect()),
    }
}

fn encode_scalar(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Int(n) => Value::from(*n),
        Scalar::Text(s) => Value::String(s.clone()),
    }
}

/// Decode attributes from a read response
///
/// Entries without a `value`, with a `null` value or with an empty list are
/// treated as absent. Extra keys inside an entry (such as inheritance
/// metadata) are ignored.
pub fn decode(wire: &WireAttributeMap) -> Result<AttributeMap, CodecError> {
    let mut attributes = AttributeMap::new();

    for (name, entry) in wire {
        let Value::Object(entry) = entry else {
            return Err(CodecError::NotAnObject {
                name: name.clone(),
                found: entry.to_string(),
            });
        };

        let value = match entry.get(VALUE_KEY) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) if items.is_empty() => continue,
            Some(Value::Array(items)) => AttributeValue::List(
                items
                    .iter()
                    .map(|item| decode_scalar(name, item))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(other) => AttributeValue::Scalar(decode_scalar(name, other)?),
        };

        attributes.insert(name.clone(), value);
    }

    Ok(attributes)
}

fn decode_scalar(name: &str, value: &Value) -> Result<Scalar, CodecError> {
    match value {
        Value::String(s) => Ok(Scalar::Text(s.clone())),
        Value::Number(n) => n.as_i64().map(Scalar::Int).ok_or_else(|| {
            CodecError::NonIntegerNumber {
                name: name.to_string(),
                found: n.to_string(),
            }
        }),
        other => Err(CodecError::UnsupportedValue {
            name: name.to_string(),
            found: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(value: Value) -> WireAttributeMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test wire payload must be an object"),
        }
    }

    #[test]
    fn test_encode_shapes() {
        let mut attrs = AttributeMap::new();
        attrs.insert("Site".into(), "Test site".into());
        attrs.insert("TestEA1".into(), AttributeValue::list(["text1", "text2"]));
        attrs.insert("TestEA2".into(), AttributeValue::list([4, 5]));
        attrs.insert("Single".into(), AttributeValue::list(["only"]));

        let encoded = encode(&attrs);
        assert_eq!(
            Value::Object(encoded),
            json!({
                "Site": { "value": "Test site" },
                "TestEA1": { "value": ["text1", "text2"] },
                "TestEA2": { "value": [4, 5] },
                "Single": { "value": ["only"] }
            })
        );
    }

    #[test]
    fn test_encode_skips_empty_values() {
        let mut attrs = AttributeMap::new();
        attrs.insert("Blank".into(), "".into());
        attrs.insert("Nothing".into(), AttributeValue::List(Vec::new()));
        attrs.insert("Kept".into(), 0.into());

        let encoded = encode(&attrs);
        assert_eq!(encoded.len(), 1);
        assert!(encoded.contains_key("Kept"));
    }

    #[test]
    fn test_encode_removals() {
        let names = vec!["Site".to_string(), "TestEA1".to_string()];
        assert_eq!(
            Value::Object(encode_removals(&names)),
            json!({ "Site": {}, "TestEA1": {} })
        );
    }

    #[test]
    fn test_decode_collapsed_list_stays_scalar() {
        let decoded = decode(&wire(json!({
            "TestEA1": { "value": "text3" },
            "TestEA2": { "value": 7 }
        })))
        .unwrap();

        assert_eq!(decoded["TestEA1"], AttributeValue::from("text3"));
        assert_eq!(decoded["TestEA2"], AttributeValue::from(7));
    }

    #[test]
    fn test_decode_tolerates_missing_and_empty() {
        assert!(decode(&WireAttributeMap::new()).unwrap().is_empty());

        let decoded = decode(&wire(json!({
            "NoValue": { "inheritance_source": { "_ref": "x" } },
            "Null": { "value": null },
            "Empty": { "value": [] },
            "Site": { "value": "Test site", "inheritance_operation": "INHERIT" }
        })))
        .unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["Site"], AttributeValue::from("Test site"));
    }

    #[test]
    fn test_decode_numbers_stay_integers() {
        let decoded = decode(&wire(json!({ "TestEA2": { "value": [4, 5] } }))).unwrap();
        assert_eq!(decoded["TestEA2"], AttributeValue::list([4, 5]));
        assert_ne!(decoded["TestEA2"], AttributeValue::list(["4", "5"]));
    }

    #[test]
    fn test_decode_rejects_unsupported_values() {
        let err = decode(&wire(json!({ "Ratio": { "value": 0.5 } }))).unwrap_err();
        assert!(matches!(err, CodecError::NonIntegerNumber { .. }));

        let err = decode(&wire(json!({ "Flag": { "value": true } }))).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedValue { .. }));

        let err = decode(&wire(json!({ "Bare": "text" }))).unwrap_err();
        assert!(matches!(err, CodecError::NotAnObject { .. }));
    }
}
