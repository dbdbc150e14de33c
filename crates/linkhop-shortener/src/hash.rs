use linkhop_core::NormalizedUrl;
use sha2::{Digest, Sha256};

/// Deduplication key of a normalized URL: lowercase hex SHA-256, 64 chars.
pub fn content_hash(url: &NormalizedUrl) -> String {
    hex::encode(Sha256::digest(url.as_str().as_bytes()))
}
