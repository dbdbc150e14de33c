use std::time::Duration;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted {
        limit: u64,
        /// Requests left in the current window after this one.
        remaining: u64,
    },
    Throttled {
        limit: u64,
        /// Time until the oldest request in the window leaves it.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }

    pub fn limit(&self) -> u64 {
        match self {
            Decision::Admitted { limit, .. } | Decision::Throttled { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> u64 {
        match self {
            Decision::Admitted { remaining, .. } => *remaining,
            Decision::Throttled { .. } => 0,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Admitted { .. } => None,
            Decision::Throttled { retry_after, .. } => Some(*retry_after),
        }
    }
}
