use clap::{Parser, ValueEnum};
use linkhop_ratelimit::FailurePolicy;
use linkhop_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "LINKHOP_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "LINKHOP_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "LINKHOP_STORAGE_BACKEND";
pub const REDIS_URL_ENV: &str = "LINKHOP_REDIS_URL";
pub const KEY_PREFIX_ENV: &str = "LINKHOP_KEY_PREFIX";
pub const STORE_TIMEOUT_MS_ENV: &str = "LINKHOP_STORE_TIMEOUT_MS";
pub const SHORT_ID_LENGTH_ENV: &str = "LINKHOP_SHORT_ID_LENGTH";
pub const MAX_ATTEMPTS_ENV: &str = "LINKHOP_MAX_ATTEMPTS";
pub const RATE_LIMIT_ENV: &str = "LINKHOP_RATE_LIMIT";
pub const RATE_WINDOW_SECS_ENV: &str = "LINKHOP_RATE_WINDOW_SECS";
pub const FAILURE_POLICY_ENV: &str = "LINKHOP_RATE_LIMIT_FAILURE_POLICY";
pub const TRUST_FORWARDED_ENV: &str = "LINKHOP_TRUST_FORWARDED";
pub const SCANNER_URL_ENV: &str = "LINKHOP_SCANNER_URL";
pub const SCAN_CACHE_TTL_SECS_ENV: &str = "LINKHOP_SCAN_CACHE_TTL_SECS";
pub const VISIT_QUEUE_CAPACITY_ENV: &str = "LINKHOP_VISIT_QUEUE_CAPACITY";
pub const VISIT_WORKERS_ENV: &str = "LINKHOP_VISIT_WORKERS";
pub const VISIT_ENQUEUE_TIMEOUT_MS_ENV: &str = "LINKHOP_VISIT_ENQUEUE_TIMEOUT_MS";
pub const SWEEP_INTERVAL_SECS_ENV: &str = "LINKHOP_SWEEP_INTERVAL_SECS";
pub const MAX_VISITS_PER_LINK_ENV: &str = "LINKHOP_MAX_VISITS_PER_LINK";
pub const LOG_FORMAT_ENV: &str = "LINKHOP_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicyArg {
    Open,
    Closed,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(arg: FailurePolicyArg) -> Self {
        match arg {
            FailurePolicyArg::Open => FailurePolicy::Open,
            FailurePolicyArg::Closed => FailurePolicy::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "linkhop-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Public origin that short URLs are built from.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("storage", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = KEY_PREFIX_ENV, default_value = linkhop_core::keys::DEFAULT_PREFIX)]
    pub key_prefix: String,

    #[arg(long, env = STORE_TIMEOUT_MS_ENV, default_value_t = 2000)]
    pub store_timeout_ms: u64,

    #[arg(long, env = SHORT_ID_LENGTH_ENV, default_value_t = 7)]
    pub short_id_length: usize,

    #[arg(long, env = MAX_ATTEMPTS_ENV, default_value_t = 5)]
    pub max_attempts: usize,

    /// Requests admitted per client within one window.
    #[arg(long, env = RATE_LIMIT_ENV, default_value_t = 100)]
    pub rate_limit: u64,

    #[arg(long, env = RATE_WINDOW_SECS_ENV, default_value_t = 3600)]
    pub rate_window_secs: u64,

    #[arg(
        long,
        env = FAILURE_POLICY_ENV,
        value_enum,
        default_value_t = FailurePolicyArg::Open
    )]
    pub failure_policy: FailurePolicyArg,

    /// Identify clients by the first `X-Forwarded-For` hop. Enable only
    /// behind a trusted reverse proxy.
    #[arg(long, env = TRUST_FORWARDED_ENV)]
    pub trust_forwarded: bool,

    /// Base URL of the malicious URL scanner. Scanning is off when unset.
    #[arg(long, env = SCANNER_URL_ENV)]
    pub scanner_url: Option<String>,

    #[arg(long, env = SCAN_CACHE_TTL_SECS_ENV, default_value_t = 86_400)]
    pub scan_cache_ttl_secs: u64,

    /// Pending visits per visit worker.
    #[arg(long, env = VISIT_QUEUE_CAPACITY_ENV, default_value_t = 1024)]
    pub visit_queue_capacity: usize,

    #[arg(long, env = VISIT_WORKERS_ENV, default_value_t = 8)]
    pub visit_workers: usize,

    /// How long a redirect waits for room in a saturated visit queue.
    #[arg(long, env = VISIT_ENQUEUE_TIMEOUT_MS_ENV, default_value_t = 1000)]
    pub visit_enqueue_timeout_ms: u64,

    /// Period of the expired key sweep of the in-memory store.
    #[arg(long, env = SWEEP_INTERVAL_SECS_ENV, default_value_t = 60)]
    pub sweep_interval_secs: u64,

    #[arg(long, env = MAX_VISITS_PER_LINK_ENV)]
    pub max_visits_per_link: Option<u64>,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Pretty
    )]
    pub log_format: LogFormatArg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = CLI::try_parse_from(["linkhop-gateway"]).unwrap();

        assert_eq!(cli.listen_addr, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(cli.storage, StorageBackendArg::InMemory);
        assert_eq!(cli.key_prefix, "lh:");
        assert_eq!(cli.short_id_length, 7);
        assert_eq!(cli.rate_limit, 100);
        assert_eq!(cli.rate_window_secs, 3600);
        assert_eq!(cli.failure_policy, FailurePolicyArg::Open);
        assert!(cli.scanner_url.is_none());
        assert!(!cli.trust_forwarded);
        assert_eq!(cli.visit_workers, 8);
        assert_eq!(cli.visit_enqueue_timeout_ms, 1000);
    }

    #[test]
    fn redis_backend_requires_url() {
        assert!(CLI::try_parse_from(["linkhop-gateway", "--storage", "redis"]).is_err());

        let cli = CLI::try_parse_from([
            "linkhop-gateway",
            "--storage",
            "redis",
            "--redis-url",
            "redis://127.0.0.1:6379",
            "--failure-policy",
            "closed",
        ])
        .unwrap();
        assert_eq!(cli.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(FailurePolicy::from(cli.failure_policy), FailurePolicy::Closed);
    }
}
