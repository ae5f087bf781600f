use hive_store::StoreError;

/// Errors reported by a hierarchical medium.
#[derive(Debug, thiserror::Error)]
pub enum MediumError {
    /// The key does not exist (or was deleted while a handle was open).
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A write was attempted through a handle opened read-only.
    #[error("key opened read-only: {0}")]
    ReadOnly(String),

    /// A key or value name the medium cannot represent.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A stored value could not be read back.
    #[error("corrupt value {name:?} under {path}: {reason}")]
    Corrupt {
        path: String,
        name: String,
        reason: String,
    },

    /// I/O error from a filesystem-backed medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The medium's internal lock was poisoned.
    #[error("medium lock poisoned")]
    LockPoisoned,
}

impl MediumError {
    /// Lift into a store error, tagging it with the key path it concerns.
    pub fn at(self, path: &str) -> StoreError {
        match self {
            Self::Io(e) => StoreError::Io(e),
            other => StoreError::Medium {
                path: path.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result alias for medium operations.
pub type MediumResult<T> = Result<T, MediumError>;
