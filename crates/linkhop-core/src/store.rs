use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a sliding-window admission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAdmission {
    /// Whether the new timestamp was recorded.
    pub admitted: bool,
    /// Entries inside the window after the step, including the new one.
    pub count: u64,
    /// Oldest timestamp (ms) still inside the window.
    pub oldest_ms: Option<i64>,
    /// The time (ms) the step was measured at. Backends that keep their own
    /// clock report it here instead of the caller's `now_ms`.
    pub now_ms: i64,
}

/// The shared key-value store.
///
/// Every operation is atomic for the single key it touches. No multi-key
/// transaction is offered, so cross-request coordination must be expressed
/// through [`set_if_absent`](KeyValueStore::set_if_absent), increments and
/// list appends rather than read-then-write pairs.
///
/// List indices follow Redis semantics: `0` is the head, negative indices
/// count from the tail and `stop` is inclusive.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the string value of `key`, or `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value`, replacing any previous value, with an optional expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Writes `value` only if `key` does not exist. Returns whether the write
    /// happened.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Increments the integer at `key` by one, creating it at zero first.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Appends `value` to the tail of the list at `key` and returns the new
    /// length.
    async fn push(&self, key: &str, value: &str) -> Result<u64>;

    /// Returns the list elements between `start` and `stop`.
    async fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// Keeps only the list elements between `start` and `stop`.
    async fn trim(&self, key: &str, start: i64, stop: i64) -> Result<()>;

    /// Sets an expiry on `key`. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Runs one sliding-window step on the timestamp set at `key`.
    ///
    /// `now_ms` is the caller's clock; a backend may substitute its own, see
    /// [`WindowAdmission::now_ms`]. Timestamps at or before
    /// `now - window` are removed from the store.
    /// If fewer than `limit` remain, `now` is recorded and the step is
    /// admitted. The key expiry is refreshed to `window` whenever a
    /// timestamp is recorded. The whole step is atomic.
    async fn admit_in_window(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
        limit: u64,
    ) -> Result<WindowAdmission>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        (**self).set_if_absent(key, value).await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        (**self).incr(key).await
    }

    async fn push(&self, key: &str, value: &str) -> Result<u64> {
        (**self).push(key, value).await
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        (**self).range(key, start, stop).await
    }

    async fn trim(&self, key: &str, start: i64, stop: i64) -> Result<()> {
        (**self).trim(key, start, stop).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        (**self).expire(key, ttl).await
    }

    async fn admit_in_window(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
        limit: u64,
    ) -> Result<WindowAdmission> {
        (**self).admit_in_window(key, now_ms, window, limit).await
    }
}
