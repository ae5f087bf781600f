use hive_types::ValueKind;

/// Errors from encoding or decoding a value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The persisted primitive has a different shape than the codec expects.
    #[error("{codec} codec cannot decode a {found} primitive")]
    ShapeMismatch {
        codec: &'static str,
        found: &'static str,
    },

    /// The value handed to a codec is not of the kind it handles.
    #[error("{codec} codec cannot encode a {kind} value")]
    KindMismatch {
        codec: &'static str,
        kind: ValueKind,
    },

    /// The persisted text could not be parsed as the requested kind.
    #[error("malformed {kind} text: {text:?}")]
    Malformed { kind: ValueKind, text: String },

    /// A widened integer does not fit back into its native width.
    #[error("{value} is out of range for {kind}")]
    OutOfRange { kind: ValueKind, value: i64 },

    /// Generic binary serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
