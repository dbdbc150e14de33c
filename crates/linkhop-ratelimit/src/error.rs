use linkhop_core::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RateLimitError>;

#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    #[error("invalid rate limit configuration: {0}")]
    InvalidConfig(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
