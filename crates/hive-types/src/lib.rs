//! Foundation types for Hive settings.
//!
//! Every other Hive crate depends on `hive-types`. It defines what a setting
//! can hold and what a backing medium can hold, and nothing else.
//!
//! # Key Types
//!
//! - [`Value`]: a stored setting value (tagged union of the supported natives)
//! - [`ValueKind`]: the runtime type tag of a [`Value`], used for dispatch
//! - [`NativeValue`]: conversion between Rust natives and [`Value`]
//! - [`Primitive`]: the wire-safe shapes a hierarchical medium stores natively
//! - [`Point`], [`Size`], [`SizeF`], [`Rectangle`]: 2D geometry primitives
//! - [`StructuredValue`]: opaque envelope for arbitrary serde types

pub mod error;
pub mod geometry;
pub mod primitive;
pub mod value;

pub use error::{TypeError, TypeResult};
pub use geometry::{Point, Rectangle, Size, SizeF};
pub use primitive::Primitive;
pub use value::{NativeValue, StructuredValue, Value, ValueKind};

/// Re-exported so downstream crates name the same date-time and decimal types.
pub use chrono::NaiveDateTime;
pub use rust_decimal::Decimal;
