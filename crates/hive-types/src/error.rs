use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown value kind: {0}")]
    UnknownKind(String),

    #[error("malformed {kind} literal: {text:?}")]
    Malformed { kind: &'static str, text: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
