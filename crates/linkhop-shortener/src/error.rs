use linkhop_core::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("no free short id after {attempts} attempts")]
    AllocationExhausted { attempts: usize },
    #[error("invalid generator configuration: {0}")]
    InvalidConfig(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ShortenerError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShortenerError::AllocationExhausted { .. } | ShortenerError::Store(_)
        )
    }
}
