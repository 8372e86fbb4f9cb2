use thiserror::Error;

/// Failures raised by a [`FlagStore`](crate::store::FlagStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to encode or decode flag record: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid stored timestamp: {0}")]
    Timestamp(String),
}

/// Errors surfaced by [`FlagService`](crate::service::FlagService) operations.
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("rollout must be between 0 and 100, got {rollout}")]
    Validation { rollout: i64 },

    #[error("flag {name} not found in environment {environment}")]
    NotFound { name: String, environment: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type Result<T, E = FlagError> = std::result::Result<T, E>;
