use crate::error::{RateLimitError, Result};
use linkhop_core::KeySpace;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_LIMIT: u64 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// What to do when the store cannot answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Admit the request and log a warning.
    #[default]
    Open,
    /// Reject the request with the store error.
    Closed,
}

impl Display for FailurePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Open => write!(f, "open"),
            FailurePolicy::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct RateLimitConfig {
    /// Requests admitted per identity within one window.
    #[builder(default = DEFAULT_LIMIT)]
    pub limit: u64,
    #[builder(default = DEFAULT_WINDOW)]
    pub window: Duration,
    #[builder(default)]
    pub failure_policy: FailurePolicy,
    #[builder(default)]
    pub keys: KeySpace,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window.as_millis() == 0 {
            return Err(RateLimitError::InvalidConfig(
                "window must be at least one millisecond".to_string(),
            ));
        }
        if i64::try_from(self.window.as_millis()).is_err() {
            return Err(RateLimitError::InvalidConfig(format!(
                "window {:?} is too large",
                self.window
            )));
        }
        Ok(())
    }
}
