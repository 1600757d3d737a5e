//! Extensible attributes
//!
//! - [`value`]: the tagged `Scalar` / `List` value model
//! - [`codec`]: conversion to and from the `extattrs` wire encoding
//! - [`diff`]: collapse-tolerant equivalence and patch computation

pub mod codec;
pub mod diff;
pub mod value;

pub use codec::{CodecError, WireAttributeMap, decode, encode, encode_removals};
pub use diff::{AttributeDiffer, AttributePatch, DiffMode, is_equivalent, patch, values_equivalent};
pub use value::{AttributeMap, AttributeValue, Scalar};
