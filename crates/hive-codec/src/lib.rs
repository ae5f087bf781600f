//! Type-codec dispatch for Hive settings.
//!
//! Converts native [`Value`](hive_types::Value)s into
//! [`Primitive`](hive_types::Primitive)s that a hierarchical medium stores
//! symmetrically, and back, so that `decode(encode(v)) == v` for every value
//! a codec accepts.
//!
//! # Dispatch
//!
//! [`CodecRegistry`] holds an ordered list of [`Codec`]s. The first codec
//! whose predicate claims a kind wins and is memoized for that kind. The
//! catch-all [`Serialized`] codec accepts every kind and therefore sits last.
//! A kind nobody claims is a wiring defect and panics.

pub mod codec;
pub mod error;
pub mod registry;

pub use codec::{
    BoolAsInt, Codec, DateTimeTicks, Geometry, Passthrough, Serialized, Stringify, Widen,
};
pub use error::{CodecError, CodecResult};
pub use registry::CodecRegistry;
