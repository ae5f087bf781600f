use hive_codec::CodecError;

/// Errors from settings store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the backing medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded for, or decoded from, the medium.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The external hierarchical medium reported a failure.
    #[error("medium error at {path}: {reason}")]
    Medium { path: String, reason: String },

    /// The persisted tree could not be written in the tagged-element format.
    #[error("format error: {0}")]
    Format(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("settings lock poisoned")]
    LockPoisoned,

    /// The owning store was closed while a sub-settings view was still held.
    #[error("settings store is closed")]
    Closed,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
