//! The [`Codec`] trait and the built-in handler families.
//!
//! A codec converts one native kind to a [`Primitive`] a hierarchical medium
//! can store symmetrically, and back. The families differ only in the
//! primitive shape they choose:
//!
//! - [`Passthrough`]: the medium already stores the value natively
//! - [`Stringify`]: culture-invariant canonical text
//! - [`DateTimeTicks`]: 100ns tick count since 0001-01-01, as text, with a
//!   sub-tick fraction only when the value needs one
//! - [`Geometry`]: comma-joined fields, tolerant of malformed text
//! - [`Widen`]: sub-32-bit integers carried as a 32-bit integer
//! - [`BoolAsInt`]: `0`/`1`
//! - [`Serialized`]: catch-all generic binary serialization

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use hive_types::{Point, Primitive, Rectangle, Size, SizeF, Value, ValueKind};
use rust_decimal::Decimal;

use crate::error::{CodecError, CodecResult};

/// Converts values of the kinds it claims to and from persistable primitives.
///
/// Implementations must be thread-safe: one registry is shared by every store.
///
/// A codec that handles exactly one kind overrides [`Codec::exact_kind`]; a
/// codec that handles a family of kinds overrides [`Codec::can_handle`]
/// instead. No codec should override both.
pub trait Codec: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// The single kind this codec handles, if it is an exact-match codec.
    fn exact_kind(&self) -> Option<ValueKind> {
        None
    }

    /// Whether this codec can encode and decode values of `kind`.
    fn can_handle(&self, kind: &ValueKind) -> bool {
        self.exact_kind().as_ref() == Some(kind)
    }

    /// Convert a native value into a symmetrically persistable primitive.
    fn encode(&self, value: &Value) -> CodecResult<Primitive>;

    /// Convert a persisted primitive back into a value of `kind`.
    ///
    /// `Ok(None)` means the primitive was readable but carried no usable
    /// value; only tolerant codecs return it.
    fn decode(&self, primitive: &Primitive, kind: &ValueKind) -> CodecResult<Option<Value>>;
}

fn kind_mismatch(codec: &'static str, value: &Value) -> CodecError {
    CodecError::KindMismatch {
        codec,
        kind: value.kind(),
    }
}

fn expect_str<'a>(codec: &'static str, primitive: &'a Primitive) -> CodecResult<&'a str> {
    primitive.as_str().ok_or(CodecError::ShapeMismatch {
        codec,
        found: primitive.shape(),
    })
}

// ---------------------------------------------------------------------------
// Passthrough
// ---------------------------------------------------------------------------

/// Values the medium stores natively: strings, 32-bit integers, string lists.
pub struct Passthrough {
    kind: ValueKind,
}

impl Passthrough {
    pub fn new(kind: ValueKind) -> Self {
        debug_assert!(matches!(
            kind,
            ValueKind::String | ValueKind::Int32 | ValueKind::Strings
        ));
        Self { kind }
    }
}

impl Codec for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn exact_kind(&self) -> Option<ValueKind> {
        Some(self.kind.clone())
    }

    fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        match value {
            Value::String(s) => Ok(Primitive::Str(s.clone())),
            Value::Int32(i) => Ok(Primitive::Int(*i)),
            Value::Strings(v) => Ok(Primitive::Strings(v.clone())),
            other => Err(kind_mismatch(self.name(), other)),
        }
    }

    fn decode(&self, primitive: &Primitive, kind: &ValueKind) -> CodecResult<Option<Value>> {
        match (kind, primitive) {
            (ValueKind::String, Primitive::Str(s)) => Ok(Some(Value::String(s.clone()))),
            (ValueKind::Int32, Primitive::Int(i)) => Ok(Some(Value::Int32(*i))),
            (ValueKind::Strings, Primitive::Strings(v)) => Ok(Some(Value::Strings(v.clone()))),
            (_, other) => Err(CodecError::ShapeMismatch {
                codec: self.name(),
                found: other.shape(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Stringify
// ---------------------------------------------------------------------------

/// Values stored as their canonical invariant text: `char`, 64-bit and
/// unsigned 32-bit integers, floating point, and decimal.
pub struct Stringify {
    kind: ValueKind,
}

impl Stringify {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }

    fn parse(&self, text: &str) -> Option<Value> {
        match self.kind {
            ValueKind::Char => text.chars().next().map(Value::Char),
            ValueKind::Int64 => text.parse::<i64>().ok().map(Value::Int64),
            ValueKind::UInt32 => text.parse::<u32>().ok().map(Value::UInt32),
            ValueKind::UInt64 => text.parse::<u64>().ok().map(Value::UInt64),
            ValueKind::Double => text.parse::<f64>().ok().map(Value::Double),
            ValueKind::Float => text.parse::<f32>().ok().map(Value::Float),
            ValueKind::Decimal => text.parse::<Decimal>().ok().map(Value::Decimal),
            _ => None,
        }
    }
}

impl Codec for Stringify {
    fn name(&self) -> &'static str {
        "stringify"
    }

    fn exact_kind(&self) -> Option<ValueKind> {
        Some(self.kind.clone())
    }

    fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        if !value.is_kind(&self.kind) {
            return Err(kind_mismatch(self.name(), value));
        }
        // Rust's float Display is the shortest text that parses back exactly.
        Ok(Primitive::Str(value.to_string()))
    }

    fn decode(&self, primitive: &Primitive, _kind: &ValueKind) -> CodecResult<Option<Value>> {
        let text = expect_str(self.name(), primitive)?;
        self.parse(text)
            .map(Some)
            .ok_or_else(|| CodecError::Malformed {
                kind: self.kind.clone(),
                text: text.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Date-time as tick count
// ---------------------------------------------------------------------------

const NANOS_PER_TICK: i128 = 100;
const NANOS_PER_SECOND: i128 = 1_000_000_000;

fn tick_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)
}

fn nanos_since_epoch(dt: &NaiveDateTime) -> Option<i128> {
    let delta = *dt - tick_epoch()?;
    Some(i128::from(delta.num_seconds()) * NANOS_PER_SECOND + i128::from(delta.subsec_nanos()))
}

fn from_nanos(total: i128) -> Option<NaiveDateTime> {
    let secs = TimeDelta::try_seconds(i64::try_from(total.div_euclid(NANOS_PER_SECOND)).ok()?)?;
    let nanos = TimeDelta::nanoseconds(i64::try_from(total.rem_euclid(NANOS_PER_SECOND)).ok()?);
    tick_epoch()?.checked_add_signed(secs)?.checked_add_signed(nanos)
}

/// Number of 100ns ticks since 0001-01-01T00:00:00. Sub-tick precision is
/// truncated; [`format_ticks`] keeps it.
pub fn to_ticks(dt: &NaiveDateTime) -> Option<i64> {
    i64::try_from(nanos_since_epoch(dt)?.div_euclid(NANOS_PER_TICK)).ok()
}

/// Inverse of [`to_ticks`].
pub fn from_ticks(ticks: i64) -> Option<NaiveDateTime> {
    from_nanos(i128::from(ticks) * NANOS_PER_TICK)
}

/// Tick count as text. Nanoseconds below one tick are written as a
/// two-digit fraction (`<ticks>.<nn>`); whole ticks have no fraction.
pub fn format_ticks(dt: &NaiveDateTime) -> Option<String> {
    let total = nanos_since_epoch(dt)?;
    let ticks = i64::try_from(total.div_euclid(NANOS_PER_TICK)).ok()?;
    match total.rem_euclid(NANOS_PER_TICK) {
        0 => Some(ticks.to_string()),
        rest => Some(format!("{ticks}.{rest:02}")),
    }
}

/// Inverse of [`format_ticks`].
pub fn parse_ticks(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let (ticks, rest) = match text.split_once('.') {
        Some((ticks, frac)) => {
            if frac.len() != 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (ticks, frac.parse::<i128>().ok()?)
        }
        None => (text, 0),
    };
    let ticks = ticks.parse::<i64>().ok()?;
    from_nanos(i128::from(ticks) * NANOS_PER_TICK + rest)
}

/// Date-times stored as the decimal text of their tick count.
pub struct DateTimeTicks;

impl Codec for DateTimeTicks {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn exact_kind(&self) -> Option<ValueKind> {
        Some(ValueKind::DateTime)
    }

    fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        let Value::DateTime(dt) = value else {
            return Err(kind_mismatch(self.name(), value));
        };
        let text = format_ticks(dt).ok_or_else(|| CodecError::Malformed {
            kind: ValueKind::DateTime,
            text: dt.to_string(),
        })?;
        Ok(Primitive::Str(text))
    }

    fn decode(&self, primitive: &Primitive, _kind: &ValueKind) -> CodecResult<Option<Value>> {
        let text = expect_str(self.name(), primitive)?;
        parse_ticks(text)
            .map(|dt| Some(Value::DateTime(dt)))
            .ok_or_else(|| CodecError::Malformed {
                kind: ValueKind::DateTime,
                text: text.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Geometry primitives stored as comma-joined fields.
///
/// Decoding malformed text yields `Ok(None)` rather than an error so that
/// hand-edited settings degrade to the caller's default.
pub struct Geometry {
    kind: ValueKind,
}

impl Geometry {
    pub fn new(kind: ValueKind) -> Self {
        debug_assert!(matches!(
            kind,
            ValueKind::Rectangle | ValueKind::Point | ValueKind::Size | ValueKind::SizeF
        ));
        Self { kind }
    }
}

impl Codec for Geometry {
    fn name(&self) -> &'static str {
        "geometry"
    }

    fn exact_kind(&self) -> Option<ValueKind> {
        Some(self.kind.clone())
    }

    fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        match value {
            Value::Rectangle(_) | Value::Point(_) | Value::Size(_) | Value::SizeF(_)
                if value.is_kind(&self.kind) =>
            {
                Ok(Primitive::Str(value.to_string()))
            }
            other => Err(kind_mismatch(self.name(), other)),
        }
    }

    fn decode(&self, primitive: &Primitive, _kind: &ValueKind) -> CodecResult<Option<Value>> {
        let text = expect_str(self.name(), primitive)?;
        Ok(match self.kind {
            ValueKind::Rectangle => Rectangle::parse(text).map(Value::Rectangle),
            ValueKind::Point => Point::parse(text).map(Value::Point),
            ValueKind::Size => Size::parse(text).map(Value::Size),
            ValueKind::SizeF => SizeF::parse(text).map(Value::SizeF),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Widen to 32-bit integer
// ---------------------------------------------------------------------------

/// Integer kinds narrower than 32 bits, carried as a 32-bit integer.
pub struct Widen {
    kind: ValueKind,
}

impl Widen {
    pub fn new(kind: ValueKind) -> Self {
        debug_assert!(matches!(
            kind,
            ValueKind::SByte | ValueKind::Byte | ValueKind::Int16 | ValueKind::UInt16
        ));
        Self { kind }
    }

    fn narrow(&self, wide: i32) -> Option<Value> {
        match self.kind {
            ValueKind::SByte => i8::try_from(wide).ok().map(Value::SByte),
            ValueKind::Byte => u8::try_from(wide).ok().map(Value::Byte),
            ValueKind::Int16 => i16::try_from(wide).ok().map(Value::Int16),
            ValueKind::UInt16 => u16::try_from(wide).ok().map(Value::UInt16),
            _ => None,
        }
    }
}

impl Codec for Widen {
    fn name(&self) -> &'static str {
        "widen"
    }

    fn exact_kind(&self) -> Option<ValueKind> {
        Some(self.kind.clone())
    }

    fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        let wide = match value {
            Value::SByte(v) => i32::from(*v),
            Value::Byte(v) => i32::from(*v),
            Value::Int16(v) => i32::from(*v),
            Value::UInt16(v) => i32::from(*v),
            other => return Err(kind_mismatch(self.name(), other)),
        };
        if !value.is_kind(&self.kind) {
            return Err(kind_mismatch(self.name(), value));
        }
        Ok(Primitive::Int(wide))
    }

    fn decode(&self, primitive: &Primitive, _kind: &ValueKind) -> CodecResult<Option<Value>> {
        let wide = primitive.as_int().ok_or(CodecError::ShapeMismatch {
            codec: self.name(),
            found: primitive.shape(),
        })?;
        self.narrow(wide)
            .map(Some)
            .ok_or_else(|| CodecError::OutOfRange {
                kind: self.kind.clone(),
                value: i64::from(wide),
            })
    }
}

// ---------------------------------------------------------------------------
// Boolean as integer
// ---------------------------------------------------------------------------

/// Booleans stored as the integers `0` and `1`.
pub struct BoolAsInt;

impl Codec for BoolAsInt {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn exact_kind(&self) -> Option<ValueKind> {
        Some(ValueKind::Bool)
    }

    fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        match value {
            Value::Bool(b) => Ok(Primitive::Int(i32::from(*b))),
            other => Err(kind_mismatch(self.name(), other)),
        }
    }

    fn decode(&self, primitive: &Primitive, _kind: &ValueKind) -> CodecResult<Option<Value>> {
        match primitive {
            Primitive::Int(i) => Ok(Some(Value::Bool(*i == 1))),
            other => Err(CodecError::ShapeMismatch {
                codec: self.name(),
                found: other.shape(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Catch-all generic serialization
// ---------------------------------------------------------------------------

/// Catch-all: any serializable kind becomes an opaque bincode blob.
///
/// Its predicate is broad, so it must be the last codec in a registry or it
/// would shadow every specific codec after it.
pub struct Serialized;

impl Serialized {
    /// Decode a blob produced by [`Serialized::encode`].
    pub fn deserialize(bytes: &[u8]) -> CodecResult<Value> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
    }
}

impl Codec for Serialized {
    fn name(&self) -> &'static str {
        "serialized"
    }

    fn can_handle(&self, kind: &ValueKind) -> bool {
        kind.is_serializable()
    }

    fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        // bincode is stateless, so a fresh encoder per call is thread-safe.
        let data = bincode::serialize(value).map_err(|e| CodecError::Serialization(e.to_string()))?;
        Ok(Primitive::Bytes(data))
    }

    fn decode(&self, primitive: &Primitive, _kind: &ValueKind) -> CodecResult<Option<Value>> {
        match primitive {
            Primitive::Bytes(data) => Self::deserialize(data).map(Some),
            other => Err(CodecError::ShapeMismatch {
                codec: self.name(),
                found: other.shape(),
            }),
        }
    }
}
