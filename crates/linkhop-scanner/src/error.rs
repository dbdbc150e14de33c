use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("scan request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("scanner response has no label")]
    MissingLabel,
}
