//! URL validation and canonicalization.
//!
//! Two submissions that point at the same resource must produce the same
//! [`NormalizedUrl`], because deduplication keys on its content hash. The
//! canonical form:
//!
//! - only `http` and `https` URLs with a host are accepted,
//! - the fragment is removed,
//! - one trailing `/` is removed from the path,
//! - query parameters whose name starts with a tracking prefix (`utm_` by
//!   default) are dropped, and an empty query is removed.
//!
//! Normalization is pure: it performs no I/O and always yields the same
//! output for the same input.

use linkhop_core::NormalizedUrl;
use thiserror::Error;
use tracing::trace;
use typed_builder::TypedBuilder;
use url::Url;

pub const DEFAULT_MAX_LENGTH: usize = 2048;

pub type Result<T> = std::result::Result<T, NormalizeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("url is empty")]
    Empty,
    #[error("url is longer than {max} characters")]
    TooLong { max: usize },
    #[error("malformed url: {0}")]
    Malformed(String),
    #[error("url scheme must be http or https, got '{0}'")]
    UnsupportedScheme(String),
    #[error("url has no host")]
    MissingHost,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct UrlNormalizer {
    /// Query parameters starting with any of these prefixes are dropped.
    #[builder(default = vec!["utm_".to_string()])]
    tracking_prefixes: Vec<String>,
    #[builder(default = DEFAULT_MAX_LENGTH)]
    max_length: usize,
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl UrlNormalizer {
    /// Whether `raw` would be accepted by [`normalize`](Self::normalize).
    pub fn is_syntactically_valid(&self, raw: &str) -> bool {
        self.parse(raw).is_ok()
    }

    /// Returns the canonical form of `raw`.
    pub fn normalize(&self, raw: &str) -> Result<NormalizedUrl> {
        let mut url = self.parse(raw)?;

        url.set_fragment(None);

        let path = url.path();
        if path.ends_with('/') && path.len() > 1 {
            let trimmed = path[..path.len() - 1].to_string();
            url.set_path(&trimmed);
        }

        if url
            .query_pairs()
            .any(|(name, _)| self.is_tracking(&name))
        {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(name, _)| !self.is_tracking(name))
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect();

            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(kept);
            }
        }

        if url.query() == Some("") {
            url.set_query(None);
        }

        trace!(raw, normalized = %url, "normalized url");
        Ok(NormalizedUrl::new_unchecked(String::from(url)))
    }

    fn parse(&self, raw: &str) -> Result<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(NormalizeError::Empty);
        }
        if raw.len() > self.max_length {
            return Err(NormalizeError::TooLong {
                max: self.max_length,
            });
        }

        let url = Url::parse(raw).map_err(|e| NormalizeError::Malformed(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(NormalizeError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(NormalizeError::MissingHost);
        }

        Ok(url)
    }

    fn is_tracking(&self, name: &str) -> bool {
        self.tracking_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Normalizes `raw` with the default rules.
pub fn normalize(raw: &str) -> Result<NormalizedUrl> {
    UrlNormalizer::default().normalize(raw)
}

/// Checks `raw` against the default rules.
pub fn is_syntactically_valid(raw: &str) -> bool {
    UrlNormalizer::default().is_syntactically_valid(raw)
}
