use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("store error: {0}")]
    Store(#[from] hive_store::StoreError),

    #[error("medium error: {0}")]
    Medium(#[from] hive_hier::MediumError),

    #[error("value error: {0}")]
    Type(#[from] hive_types::TypeError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
