use crate::Result;
use async_trait::async_trait;
use linkhop_core::{NormalizedUrl, ShortId};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a raw short id to its target URL.
    /// Returns `None` if the id is malformed or was never created.
    async fn resolve(&self, short_id: &str) -> Result<Option<NormalizedUrl>>;

    /// Records one redirect. Failures are logged, never returned.
    async fn record_visit(&self, visit: Visit);

    /// Returns the click count and the requested slice of the visit log.
    async fn get_analytics(&self, short_id: &str, range: VisitRange) -> Result<Analytics>;
}

/// A redirect as observed by the gateway, before it is stamped.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Visit {
    pub short_id: ShortId,
    #[builder(default, setter(into))]
    pub client_address: String,
    #[builder(default, setter(into))]
    pub user_agent: String,
    #[builder(default, setter(into))]
    pub referrer: String,
}

/// One VisitLog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    #[serde(default)]
    pub client_address: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub referrer: String,
    pub timestamp_millis: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_clicks: u64,
    /// Oldest first.
    pub visits: Vec<VisitRecord>,
}

/// Window into a VisitLog, counted from the oldest entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitRange {
    pub offset: u64,
    /// `None` reads to the end of the log.
    pub limit: Option<u64>,
}

impl VisitRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(offset: u64, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    /// Inclusive list bounds for this range, or `None` when it is empty.
    pub(crate) fn bounds(&self) -> Option<(i64, i64)> {
        let start = i64::try_from(self.offset).ok()?;
        match self.limit {
            None => Some((start, -1)),
            Some(0) => None,
            Some(limit) => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                Some((start, start.saturating_add(limit - 1)))
            }
        }
    }
}
