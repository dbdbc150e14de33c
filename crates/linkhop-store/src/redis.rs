use async_trait::async_trait;
use linkhop_core::error::Result;
use linkhop_core::{KeyValueStore, StoreError, WindowAdmission};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Sliding-window step on a sorted set scored by timestamp.
///
/// KEYS[1] window key
/// ARGV[1] now (ms) or empty to use the server clock, ARGV[2] window (ms),
/// ARGV[3] limit, ARGV[4] unique member suffix
///
/// Returns `{admitted, count, has_oldest, oldest, now}`.
const WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
if now == nil then
  local time = redis.call('TIME')
  now = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)
end
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)

local count = redis.call('ZCARD', key)
local admitted = 0
if count < limit then
  redis.call('ZADD', key, now, now .. '-' .. ARGV[4])
  redis.call('PEXPIRE', key, window)
  count = count + 1
  admitted = 1
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  return {admitted, count, 1, tonumber(oldest[2]), now}
end
return {admitted, count, 0, 0, now}
"#;

/// Which clock timestamps a rate window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowClock {
    /// Redis `TIME`, shared by every gateway that uses the same server.
    #[default]
    Server,
    /// The `now_ms` passed by the caller.
    Caller,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> StoreError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        StoreError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Unavailable(message)
    } else if message.contains("WRONGTYPE") {
        StoreError::InvalidData(message)
    } else {
        StoreError::Operation(message)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// A Redis implementation of [`KeyValueStore`].
///
/// Holds a [`ConnectionManager`], which multiplexes all callers over one
/// connection and reconnects transparently. The store is created once at
/// startup and cloned into every component; clones share the connection.
///
/// Every command is bounded by a timeout. An elapsed timeout is reported as
/// [`StoreError::Timeout`], since the command may still have been applied.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
    window_clock: WindowClock,
    window_script: Script,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout", &self.timeout)
            .field("window_clock", &self.window_clock)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Creates a store on top of an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            timeout: DEFAULT_TIMEOUT,
            window_clock: WindowClock::default(),
            window_script: Script::new(WINDOW_SCRIPT),
        }
    }

    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., `"redis://localhost:6379"`)
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!(redis_url = %redis_url, "connecting to redis");

        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("failed to create redis client", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("failed to connect to redis", e))?;

        let store = Self::new(conn);
        store.ping().await?;
        info!("connected to redis");
        Ok(store)
    }

    /// Overrides the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Selects the clock for rate windows. [`WindowClock::Caller`] is meant
    /// for tests that drive time by hand.
    pub fn with_window_clock(mut self, clock: WindowClock) -> Self {
        self.window_clock = clock;
        self
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded("ping", redis::cmd("PING").query_async::<String>(&mut conn))
            .await
            .map(|_| ())
    }

    /// Awaits `fut` within the configured timeout.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(operation, error = %e, "redis command failed");
                Err(map_redis_error(operation, e))
            }
            Err(_) => {
                warn!(operation, timeout = ?self.timeout, "redis command timed out");
                Err(StoreError::Timeout(format!(
                    "{operation}: no reply within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        trace!(key, "GET");
        let mut conn = self.conn.clone();
        self.bounded("get", conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        trace!(key, ttl = ?ttl, "SET");
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        self.bounded("set", cmd.query_async::<()>(&mut conn)).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        trace!(key, "SETNX");
        let mut conn = self.conn.clone();
        let written = self
            .bounded("set_if_absent", conn.set_nx::<_, _, bool>(key, value))
            .await?;
        debug!(key, written, "set if absent");
        Ok(written)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        trace!(key, "INCR");
        let mut conn = self.conn.clone();
        self.bounded("incr", conn.incr::<_, _, i64>(key, 1)).await
    }

    async fn push(&self, key: &str, value: &str) -> Result<u64> {
        trace!(key, "RPUSH");
        let mut conn = self.conn.clone();
        self.bounded("push", conn.rpush::<_, _, u64>(key, value))
            .await
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        trace!(key, start, stop, "LRANGE");
        let mut conn = self.conn.clone();
        self.bounded(
            "range",
            redis::cmd("LRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .query_async::<Vec<String>>(&mut conn),
        )
        .await
    }

    async fn trim(&self, key: &str, start: i64, stop: i64) -> Result<()> {
        trace!(key, start, stop, "LTRIM");
        let mut conn = self.conn.clone();
        self.bounded(
            "trim",
            redis::cmd("LTRIM")
                .arg(key)
                .arg(start)
                .arg(stop)
                .query_async::<()>(&mut conn),
        )
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        trace!(key, ttl = ?ttl, "PEXPIRE");
        let mut conn = self.conn.clone();
        self.bounded(
            "expire",
            redis::cmd("PEXPIRE")
                .arg(key)
                .arg(millis(ttl))
                .query_async::<bool>(&mut conn),
        )
        .await
    }

    async fn admit_in_window(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
        limit: u64,
    ) -> Result<WindowAdmission> {
        trace!(key, now_ms, limit, clock = ?self.window_clock, "window step");
        let now_arg = match self.window_clock {
            WindowClock::Server => String::new(),
            WindowClock::Caller => now_ms.to_string(),
        };
        let member = format!("{:016x}", rand::random::<u64>());
        let mut conn = self.conn.clone();
        let mut invocation = self.window_script.key(key);
        invocation
            .arg(now_arg)
            .arg(millis(window))
            .arg(limit)
            .arg(member);

        let (admitted, count, has_oldest, oldest, measured_at) = self
            .bounded(
                "admit_in_window",
                invocation.invoke_async::<(i64, i64, i64, i64, i64)>(&mut conn),
            )
            .await?;

        Ok(WindowAdmission {
            admitted: admitted == 1,
            count: u64::try_from(count).map_err(|_| {
                StoreError::InvalidData(format!("negative window count for '{key}'"))
            })?,
            oldest_ms: (has_oldest == 1).then_some(oldest),
            now_ms: measured_at,
        })
    }
}
