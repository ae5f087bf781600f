use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::geometry::{Point, Rectangle, Size, SizeF};

/// Runtime type tag of a [`Value`].
///
/// This is the dispatch key of the codec registry and the `desired type` of a
/// typed read. Structured values carry the Rust type name of their payload so
/// two different serde types never satisfy each other's reads.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Char,
    String,
    Bool,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    Float,
    Decimal,
    DateTime,
    Rectangle,
    Point,
    Size,
    SizeF,
    Strings,
    ByteArray,
    /// Arbitrary serde type, identified by its type name.
    Structured(String),
}

impl ValueKind {
    /// Every kind with a fixed tag, in tag-enumeration order.
    pub const TAGGED: [ValueKind; 21] = [
        Self::Char,
        Self::String,
        Self::Bool,
        Self::SByte,
        Self::Byte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Double,
        Self::Float,
        Self::Decimal,
        Self::DateTime,
        Self::Rectangle,
        Self::Point,
        Self::Size,
        Self::SizeF,
        Self::Strings,
        Self::ByteArray,
    ];

    /// The tag name used by persisted formats. Structured kinds share `Object`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Char => "Char",
            Self::String => "String",
            Self::Bool => "Bool",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Double => "Double",
            Self::Float => "Float",
            Self::Decimal => "Decimal",
            Self::DateTime => "DateTime",
            Self::Rectangle => "Rectangle",
            Self::Point => "Point",
            Self::Size => "Size",
            Self::SizeF => "SizeF",
            Self::Strings => "Strings",
            Self::ByteArray => "ByteArray",
            Self::Structured(_) => "Object",
        }
    }

    /// Whether a value of this kind can go through the generic binary
    /// serializer. Every [`Value`] derives serde, so this holds for all kinds;
    /// it is the broad predicate of the catch-all codec.
    pub fn is_serializable(&self) -> bool {
        true
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(name) => write!(f, "Object({name})"),
            other => f.write_str(other.tag()),
        }
    }
}

impl FromStr for ValueKind {
    type Err = TypeError;

    /// Parse one of the fixed tags. `Object` needs a type name and is not
    /// accepted here.
    fn from_str(s: &str) -> TypeResult<Self> {
        Self::TAGGED
            .iter()
            .find(|k| k.tag() == s)
            .cloned()
            .ok_or_else(|| TypeError::UnknownKind(s.to_string()))
    }
}

/// Opaque envelope around a bincode-serialized serde value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredValue {
    /// `std::any::type_name` of the packed type.
    pub type_name: String,
    /// bincode encoding of the packed value.
    pub payload: Vec<u8>,
}

impl StructuredValue {
    pub fn new(type_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            payload,
        }
    }

    /// Pack any serde value.
    pub fn pack<T: Serialize>(value: &T) -> TypeResult<Self> {
        let payload =
            bincode::serialize(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::new(std::any::type_name::<T>(), payload))
    }

    /// Unpack into `T`. Fails if the envelope was packed from another type.
    pub fn unpack<T: DeserializeOwned>(&self) -> TypeResult<T> {
        let expected = std::any::type_name::<T>();
        if self.type_name != expected {
            return Err(TypeError::Serialization(format!(
                "envelope holds {}, not {expected}",
                self.type_name
            )));
        }
        bincode::deserialize(&self.payload).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// The kind a structured value of type `T` reports.
    pub fn kind_of<T>() -> ValueKind {
        ValueKind::Structured(std::any::type_name::<T>().to_string())
    }
}

/// A stored setting value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Char(char),
    String(String),
    Bool(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Float(f32),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Rectangle(Rectangle),
    Point(Point),
    Size(Size),
    SizeF(SizeF),
    Strings(Vec<String>),
    ByteArray(Vec<u8>),
    Structured(StructuredValue),
}

impl Value {
    /// The runtime type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Char(_) => ValueKind::Char,
            Self::String(_) => ValueKind::String,
            Self::Bool(_) => ValueKind::Bool,
            Self::SByte(_) => ValueKind::SByte,
            Self::Byte(_) => ValueKind::Byte,
            Self::Int16(_) => ValueKind::Int16,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::Int32(_) => ValueKind::Int32,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Double(_) => ValueKind::Double,
            Self::Float(_) => ValueKind::Float,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Rectangle(_) => ValueKind::Rectangle,
            Self::Point(_) => ValueKind::Point,
            Self::Size(_) => ValueKind::Size,
            Self::SizeF(_) => ValueKind::SizeF,
            Self::Strings(_) => ValueKind::Strings,
            Self::ByteArray(_) => ValueKind::ByteArray,
            Self::Structured(s) => ValueKind::Structured(s.type_name.clone()),
        }
    }

    /// Whether this value satisfies a read that asked for `kind`.
    pub fn is_kind(&self, kind: &ValueKind) -> bool {
        match (self, kind) {
            (Self::Structured(s), ValueKind::Structured(name)) => &s.type_name == name,
            _ => &self.kind() == kind,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            Self::Rectangle(v) => write!(f, "{v}"),
            Self::Point(v) => write!(f, "{v}"),
            Self::Size(v) => write!(f, "{v}"),
            Self::SizeF(v) => write!(f, "{v}"),
            Self::Strings(v) => write!(f, "{}", v.join(", ")),
            Self::ByteArray(v) => write!(f, "<{} bytes>", v.len()),
            Self::Structured(v) => write!(f, "<{}: {} bytes>", v.type_name, v.payload.len()),
        }
    }
}

/// A Rust native type that round-trips through [`Value`].
pub trait NativeValue: Sized {
    /// The kind every value of this type reports.
    fn kind() -> ValueKind;

    fn into_value(self) -> Value;

    /// Extract from a value of the matching kind; `None` on any other kind.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! native_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl NativeValue for $ty {
                fn kind() -> ValueKind {
                    ValueKind::$variant
                }

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

native_value! {
    char => Char,
    String => String,
    bool => Bool,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f64 => Double,
    f32 => Float,
    Decimal => Decimal,
    NaiveDateTime => DateTime,
    Rectangle => Rectangle,
    Point => Point,
    Size => Size,
    SizeF => SizeF,
    Vec<String> => Strings,
    Vec<u8> => ByteArray,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<StructuredValue> for Value {
    fn from(v: StructuredValue) -> Self {
        Value::Structured(v)
    }
}
