//! Sliding-window rate limiting over a shared [`KeyValueStore`].
//!
//! Every identity owns a RateWindow key holding the timestamps of its
//! admitted requests within the trailing window. A check trims expired
//! timestamps, compares the remainder with the limit and records the new
//! request, all in one atomic store step, so concurrent requests from the
//! same identity can never overshoot the limit.
//!
//! [`KeyValueStore`]: linkhop_core::KeyValueStore

pub mod config;
pub mod decision;
pub mod error;
pub mod limiter;

pub use config::{FailurePolicy, RateLimitConfig};
pub use decision::Decision;
pub use error::{RateLimitError, Result};
pub use limiter::{Limiter, RateLimiter};
