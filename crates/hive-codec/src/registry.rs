use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use hive_types::{Primitive, Value, ValueKind};
use tracing::error;

use crate::codec::{
    BoolAsInt, Codec, DateTimeTicks, Geometry, Passthrough, Serialized, Stringify, Widen,
};
use crate::error::CodecResult;

/// Ordered collection of codecs with a memoized kind → codec lookup.
///
/// Resolution scans the codecs top to bottom and takes the first one whose
/// predicate claims the kind. The winning index is cached per kind; the cache
/// is guarded by a single mutex, and a racing double insert is harmless since
/// resolution is deterministic.
///
/// One registry is meant to be constructed at startup and shared by every
/// store through an `Arc`.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
    cache: Mutex<HashMap<ValueKind, usize>>,
}

impl CodecRegistry {
    /// The standard codec order: common kinds first, then the remaining
    /// primitives, date-time and geometry, and the catch-all last.
    pub fn standard() -> Self {
        Self::with_codecs(vec![
            // common kinds up top
            Box::new(Passthrough::new(ValueKind::String)),
            Box::new(BoolAsInt),
            Box::new(Passthrough::new(ValueKind::Int32)),
            Box::new(Stringify::new(ValueKind::Double)),
            Box::new(Stringify::new(ValueKind::Int64)),
            // all other primitive kinds
            Box::new(Widen::new(ValueKind::SByte)),
            Box::new(Widen::new(ValueKind::Byte)),
            Box::new(Stringify::new(ValueKind::Char)),
            Box::new(Widen::new(ValueKind::Int16)),
            Box::new(Widen::new(ValueKind::UInt16)),
            Box::new(Stringify::new(ValueKind::UInt32)),
            Box::new(Stringify::new(ValueKind::UInt64)),
            Box::new(Stringify::new(ValueKind::Float)),
            Box::new(Stringify::new(ValueKind::Decimal)),
            Box::new(DateTimeTicks),
            Box::new(Geometry::new(ValueKind::Rectangle)),
            Box::new(Geometry::new(ValueKind::Point)),
            Box::new(Geometry::new(ValueKind::Size)),
            Box::new(Geometry::new(ValueKind::SizeF)),
            Box::new(Passthrough::new(ValueKind::Strings)),
            // catch-all
            Box::new(Serialized),
        ])
    }

    /// A registry over an explicit codec order. Any codec after one with a
    /// broad predicate may never be reached.
    pub fn with_codecs(codecs: Vec<Box<dyn Codec>>) -> Self {
        Self {
            codecs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The standard registry behind a shareable handle.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::standard())
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Find the codec for `kind`, or `None` if nothing claims it.
    pub fn resolve(&self, kind: &ValueKind) -> Option<&dyn Codec> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&idx) = cache.get(kind) {
            return Some(self.codecs[idx].as_ref());
        }
        let idx = self.codecs.iter().position(|c| c.can_handle(kind))?;
        cache.insert(kind.clone(), idx);
        Some(self.codecs[idx].as_ref())
    }

    /// Like [`resolve`](Self::resolve), but a missing codec is a wiring
    /// defect: a kind was introduced without registering a codec for it.
    fn codec_for(&self, kind: &ValueKind) -> &dyn Codec {
        match self.resolve(kind) {
            Some(codec) => codec,
            None => {
                error!(%kind, "no codec registered");
                panic!("no codec was found for kind {kind}");
            }
        }
    }

    /// Take a native value and return its persistable representation.
    ///
    /// # Panics
    ///
    /// Panics if no registered codec handles the value's kind.
    pub fn encode(&self, value: &Value) -> CodecResult<Primitive> {
        self.codec_for(&value.kind()).encode(value)
    }

    /// Take a persisted primitive and return a native value of `kind`.
    ///
    /// # Panics
    ///
    /// Panics if no registered codec handles `kind`.
    pub fn decode(&self, primitive: &Primitive, kind: &ValueKind) -> CodecResult<Option<Value>> {
        self.codec_for(kind).decode(primitive, kind)
    }

    /// Decode a blob with the generic serializer, whatever kind it holds.
    pub fn decode_blob(&self, bytes: &[u8]) -> CodecResult<Value> {
        Serialized::deserialize(bytes)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .cache
            .lock()
            .map(|c| c.len())
            .unwrap_or_default();
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.codecs.len())
            .field("cached", &cached)
            .finish()
    }
}
