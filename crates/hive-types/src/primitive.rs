use std::fmt;

use serde::{Deserialize, Serialize};

/// A persistable primitive: the bounded set of shapes a hierarchical medium
/// stores natively.
///
/// Whatever a codec encodes into a `Primitive` must come back equal when the
/// medium returns it, so only shapes with exact round-trip storage are here.
/// Floating point, for example, is deliberately absent and travels as `Str`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    /// Text.
    Str(String),
    /// 32-bit signed integer.
    Int(i32),
    /// Ordered list of strings.
    Strings(Vec<String>),
    /// Opaque byte blob.
    Bytes(Vec<u8>),
}

impl Primitive {
    /// Short name of the shape, for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Strings(_) => "strings",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Strings(v) => write!(f, "{v:?}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}
