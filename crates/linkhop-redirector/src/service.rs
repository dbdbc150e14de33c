use std::sync::Arc;

use crate::redirector::{Analytics, Redirector, Visit, VisitRange, VisitRecord};
use crate::Result;
use async_trait::async_trait;
use linkhop_core::{Clock, KeySpace, KeyValueStore, NormalizedUrl, ShortId, StoreError};
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct RedirectorSettings {
    #[builder(default)]
    pub keys: KeySpace,
    /// Keep only the newest N visits per link. `None` or zero keeps all.
    #[builder(default, setter(strip_option))]
    pub max_visits_per_link: Option<u64>,
}

/// Service for handling redirects and their analytics.
///
/// Reads ShortLinks written by the shortener and owns the ClickCounter and
/// VisitLog keys. The counter and the log are written independently, so a
/// partial failure can leave them off by one; both are best-effort.
#[derive(Debug, Clone)]
pub struct RedirectorService<S, C> {
    store: Arc<S>,
    clock: C,
    settings: RedirectorSettings,
}

impl<S: KeyValueStore, C: Clock> RedirectorService<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self::with_settings(store, clock, RedirectorSettings::default())
    }

    pub fn with_settings(store: S, clock: C, settings: RedirectorSettings) -> Self {
        Self {
            store: Arc::new(store),
            clock,
            settings,
        }
    }

    async fn click_count(&self, id: &ShortId) -> Result<u64> {
        let key = self.settings.keys.clicks(id);
        match self.store.get(&key).await? {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                StoreError::InvalidData(format!("key '{key}' holds a non-counter value: {e}"))
                    .into()
            }),
            None => Ok(0),
        }
    }

    async fn visits(&self, id: &ShortId, range: VisitRange) -> Result<Vec<VisitRecord>> {
        let Some((start, stop)) = range.bounds() else {
            return Ok(Vec::new());
        };

        let key = self.settings.keys.visits(id);
        let entries = self.store.range(&key, start, stop).await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_str::<VisitRecord>(&entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(code = %id, error = %e, "skipping unreadable visit entry");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl<S: KeyValueStore, C: Clock> Redirector for RedirectorService<S, C> {
    async fn resolve(&self, short_id: &str) -> Result<Option<NormalizedUrl>> {
        let Ok(id) = ShortId::new(short_id) else {
            trace!(code = %short_id, "malformed short id");
            return Ok(None);
        };

        match self.store.get(&self.settings.keys.link(&id)).await? {
            Some(url) => {
                debug!(code = %id, url = %url, "resolved short id");
                Ok(Some(NormalizedUrl::new_unchecked(url)))
            }
            None => {
                trace!(code = %id, "short id not found");
                Ok(None)
            }
        }
    }

    async fn record_visit(&self, visit: Visit) {
        let id = &visit.short_id;
        let keys = &self.settings.keys;

        if let Err(e) = self.store.incr(&keys.clicks(id)).await {
            warn!(code = %id, error = %e, "failed to increment click counter");
        }

        let record = VisitRecord {
            client_address: visit.client_address.clone(),
            user_agent: visit.user_agent.clone(),
            referrer: visit.referrer.clone(),
            timestamp_millis: self.clock.now_millis(),
        };
        let entry = match serde_json::to_string(&record) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(code = %id, error = %e, "failed to encode visit");
                return;
            }
        };

        let visits_key = keys.visits(id);
        let len = match self.store.push(&visits_key, &entry).await {
            Ok(len) => len,
            Err(e) => {
                warn!(code = %id, error = %e, "failed to append visit");
                return;
            }
        };
        trace!(code = %id, len, "visit recorded");

        if let Some(cap) = self.settings.max_visits_per_link.filter(|cap| *cap > 0) {
            if len > cap {
                let keep = i64::try_from(cap).unwrap_or(i64::MAX);
                if let Err(e) = self.store.trim(&visits_key, -keep, -1).await {
                    warn!(code = %id, error = %e, "failed to trim visit log");
                }
            }
        }
    }

    async fn get_analytics(&self, short_id: &str, range: VisitRange) -> Result<Analytics> {
        let Ok(id) = ShortId::new(short_id) else {
            trace!(code = %short_id, "malformed short id, empty analytics");
            return Ok(Analytics::default());
        };

        let total_clicks = self.click_count(&id).await?;
        let visits = self.visits(&id, range).await?;
        debug!(code = %id, total_clicks, visits = visits.len(), "loaded analytics");

        Ok(Analytics {
            total_clicks,
            visits,
        })
    }
}
