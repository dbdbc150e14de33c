use thiserror::Error;

/// Result type for key-value store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("stored value is invalid: {0}")]
    InvalidData(String),
    #[error("store operation failed: {0}")]
    Operation(String),
}

impl StoreError {
    /// Whether the outcome of the failed operation is unknown.
    ///
    /// A timed out write may or may not have been applied by the store, so
    /// callers must re-read state instead of assuming it failed.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, StoreError::Timeout(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
}
