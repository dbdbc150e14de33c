//! Malicious URL classification.
//!
//! [`HttpClassifier`] asks an external scanning service about a URL and
//! [`CachedClassifier`] keeps its definite answers in the shared store for a
//! day. A classifier never fails: anything that prevents a definite answer
//! is reported as [`Verdict::Unknown`], and callers proceed as if the URL
//! were benign.

pub mod cached;
pub mod error;
pub mod http;

pub use cached::{CachedClassifier, DEFAULT_VERDICT_TTL};
pub use error::{Result, ScanError};
pub use http::{HttpClassifier, HttpClassifierConfig};

use async_trait::async_trait;
use linkhop_core::NormalizedUrl;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Malicious,
    Benign,
    Unknown,
}

impl Verdict {
    pub fn is_malicious(&self) -> bool {
        matches!(self, Verdict::Malicious)
    }

    /// Maps a scanner label onto a verdict. Labels compare case-insensitively.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "" => Verdict::Unknown,
            "malicious" | "phishing" | "malware" => Verdict::Malicious,
            _ => Verdict::Benign,
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Malicious => write!(f, "malicious"),
            Verdict::Benign => write!(f, "benign"),
            Verdict::Unknown => write!(f, "unknown"),
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    async fn classify(&self, url: &NormalizedUrl) -> Verdict;
}

#[async_trait]
impl<T: Classifier + ?Sized> Classifier for std::sync::Arc<T> {
    async fn classify(&self, url: &NormalizedUrl) -> Verdict {
        (**self).classify(url).await
    }
}
