use std::sync::Arc;
use std::time::Duration;

use crate::config::{FailurePolicy, RateLimitConfig};
use crate::decision::Decision;
use crate::error::Result;
use async_trait::async_trait;
use linkhop_core::{Clock, KeyValueStore, WindowAdmission};
use tracing::{debug, trace, warn};

#[async_trait]
pub trait Limiter: Send + Sync + 'static {
    /// Counts one request from `identity` against its window.
    async fn check(&self, identity: &str) -> Result<Decision>;
}

/// Sliding-window limiter keyed by caller identity.
#[derive(Debug, Clone)]
pub struct RateLimiter<S, C> {
    store: Arc<S>,
    clock: C,
    config: RateLimitConfig,
}

impl<S: KeyValueStore, C: Clock> RateLimiter<S, C> {
    pub fn new(store: S, clock: C, config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(store),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn decide(&self, identity: &str, step: WindowAdmission) -> Decision {
        let limit = self.config.limit;

        if step.admitted {
            let remaining = limit.saturating_sub(step.count);
            trace!(identity, remaining, "request admitted");
            return Decision::Admitted { limit, remaining };
        }

        let window_ms = i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX);
        let retry_after = match step.oldest_ms {
            Some(oldest) => {
                let wait = oldest.saturating_add(window_ms).saturating_sub(step.now_ms);
                Duration::from_millis(u64::try_from(wait).unwrap_or(0))
            }
            // a zero limit never admits anything
            None => self.config.window,
        };
        debug!(identity, count = step.count, retry_after = ?retry_after, "request throttled");

        Decision::Throttled { limit, retry_after }
    }
}

#[async_trait]
impl<S: KeyValueStore, C: Clock> Limiter for RateLimiter<S, C> {
    async fn check(&self, identity: &str) -> Result<Decision> {
        let key = self.config.keys.rate(identity);
        let now_ms = self.clock.now_millis();

        match self
            .store
            .admit_in_window(&key, now_ms, self.config.window, self.config.limit)
            .await
        {
            Ok(step) => Ok(self.decide(identity, step)),
            Err(e) => match self.config.failure_policy {
                FailurePolicy::Open => {
                    warn!(identity, error = %e, "rate limit store failed, admitting request");
                    Ok(Decision::Admitted {
                        limit: self.config.limit,
                        remaining: self.config.limit,
                    })
                }
                FailurePolicy::Closed => {
                    warn!(identity, error = %e, "rate limit store failed, rejecting request");
                    Err(e.into())
                }
            },
        }
    }
}
