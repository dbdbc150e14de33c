use crate::short_id::ShortId;
use crate::url::NormalizedUrl;

pub const DEFAULT_PREFIX: &str = "lh:";

/// Key layout of every entity kept in the shared store.
///
/// All components must build keys through the same `KeySpace` so that a
/// deployment can move the whole data set under a different prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// ShortLink: short id -> normalized URL.
    pub fn link(&self, id: &ShortId) -> String {
        format!("{}link:{}", self.prefix, id.as_str())
    }

    /// HashIndex: content hash -> short id.
    pub fn hash(&self, digest: &str) -> String {
        format!("{}hash:{}", self.prefix, digest)
    }

    /// ClickCounter for a short id.
    pub fn clicks(&self, id: &ShortId) -> String {
        format!("{}clicks:{}", self.prefix, id.as_str())
    }

    /// VisitLog for a short id.
    pub fn visits(&self, id: &ShortId) -> String {
        format!("{}visits:{}", self.prefix, id.as_str())
    }

    /// RateWindow for a caller identity.
    pub fn rate(&self, identity: &str) -> String {
        format!("{}rate:{}", self.prefix, identity)
    }

    /// Cached classifier verdict for a normalized URL.
    pub fn scan(&self, url: &NormalizedUrl) -> String {
        format!("{}scan:{}", self.prefix, url.as_str())
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
