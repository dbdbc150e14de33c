use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::app::App;
use crate::cli::{StorageBackendArg, CLI};
use crate::state::AppState;
use anyhow::Context;
use linkhop_core::{KeySpace, KeyValueStore, SystemClock};
use linkhop_ratelimit::{RateLimitConfig, RateLimiter};
use linkhop_redirector::{QueueSettings, RedirectorService, RedirectorSettings, VisitQueue};
use linkhop_scanner::{CachedClassifier, Classifier, HttpClassifier, HttpClassifierConfig};
use linkhop_shortener::{RandomGenerator, ShortenerService, ShortenerSettings};
use linkhop_store::{InMemoryStore, RedisStore};
use tracing::info;

/// The store handle shared by every component.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Application state plus the visit worker it feeds.
pub struct Services {
    pub state: AppState,
    pub visit_queue: VisitQueue,
}

/// Opens the configured store backend.
pub async fn connect_store(config: &CLI) -> anyhow::Result<SharedStore> {
    match config.storage {
        StorageBackendArg::InMemory => {
            let store = InMemoryStore::new();
            // runs for the life of the process
            store.spawn_sweeper(Duration::from_secs(config.sweep_interval_secs.max(1)));
            Ok(Arc::new(store))
        }
        StorageBackendArg::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .context("redis url is required when storage backend is redis")?;
            let store = RedisStore::connect(redis_url)
                .await?
                .with_timeout(Duration::from_millis(config.store_timeout_ms));
            Ok(Arc::new(store))
        }
    }
}

/// Wires the services on top of `store`. Must run inside a tokio runtime,
/// since it starts the visit worker.
pub fn build_services(config: &CLI, store: SharedStore) -> anyhow::Result<Services> {
    let keys = KeySpace::new(config.key_prefix.clone());

    let shortener = ShortenerService::with_settings(
        store.clone(),
        RandomGenerator::with_length(config.short_id_length)?,
        ShortenerSettings::builder()
            .max_attempts(config.max_attempts)
            .keys(keys.clone())
            .build(),
    )?;

    let redirector = Arc::new(RedirectorService::with_settings(
        store.clone(),
        SystemClock,
        RedirectorSettings {
            keys: keys.clone(),
            max_visits_per_link: config.max_visits_per_link,
        },
    ));
    let visit_queue = VisitQueue::spawn(
        Arc::clone(&redirector),
        QueueSettings::builder()
            .workers(config.visit_workers)
            .capacity(config.visit_queue_capacity)
            .enqueue_timeout(Duration::from_millis(config.visit_enqueue_timeout_ms))
            .build(),
    );

    let limiter = RateLimiter::new(
        store.clone(),
        SystemClock,
        RateLimitConfig::builder()
            .limit(config.rate_limit)
            .window(Duration::from_secs(config.rate_window_secs))
            .failure_policy(config.failure_policy.into())
            .keys(keys.clone())
            .build(),
    )?;

    let classifier: Option<Arc<dyn Classifier>> = match &config.scanner_url {
        Some(scanner_url) => {
            let http = HttpClassifier::new(
                HttpClassifierConfig::builder()
                    .base_url(scanner_url.as_str())
                    .build(),
            )?;
            info!(endpoint = %http.endpoint(), "url scanning enabled");
            Some(Arc::new(
                CachedClassifier::new(http, store)
                    .with_keys(keys)
                    .with_ttl(Duration::from_secs(config.scan_cache_ttl_secs)),
            ))
        }
        None => None,
    };

    let state = AppState::builder()
        .shortener(Arc::new(shortener))
        .redirector(redirector)
        .limiter(Arc::new(limiter))
        .classifier(classifier)
        .visits(visit_queue.sender())
        .base_url(config.base_url.clone())
        .trust_forwarded(config.trust_forwarded)
        .build();

    Ok(Services { state, visit_queue })
}

/// Serves until SIGINT or SIGTERM, then drains the visit queue.
pub async fn run(config: CLI) -> anyhow::Result<()> {
    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        base_url = %config.base_url,
        "starting linkhop gateway"
    );

    let store = connect_store(&config).await?;
    let Services { state, visit_queue } = build_services(&config, store)?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        App::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped, draining visit queue");
    visit_queue.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use linkhop_core::NormalizedUrl;
    use linkhop_shortener::Shortener;

    fn cli(args: &[&str]) -> CLI {
        CLI::try_parse_from(std::iter::once("linkhop-gateway").chain(args.iter().copied()))
            .unwrap()
    }

    #[tokio::test]
    async fn wires_configured_services() {
        let config = cli(&["--short-id-length", "9", "--key-prefix", "test:"]);
        let store = InMemoryStore::new();

        let Services { state, visit_queue } =
            build_services(&config, Arc::new(store.clone())).unwrap();
        let id = state
            .shortener
            .resolve_or_create(&NormalizedUrl::new_unchecked("https://example.com/"))
            .await
            .unwrap();

        assert_eq!(id.as_str().len(), 9);
        assert!(store
            .get(&format!("test:link:{id}"))
            .await
            .unwrap()
            .is_some());
        assert!(state.classifier.is_none());

        // the worker stops once the state's sender is gone
        drop(state);
        assert_eq!(visit_queue.shutdown().await, 0);
    }

    #[tokio::test]
    async fn rejects_short_ids_below_minimum() {
        let config = cli(&["--short-id-length", "3"]);

        assert!(build_services(&config, Arc::new(InMemoryStore::new())).is_err());
    }

    #[tokio::test]
    async fn rejects_zero_allocation_attempts() {
        let config = cli(&["--max-attempts", "0"]);

        assert!(build_services(&config, Arc::new(InMemoryStore::new())).is_err());
    }

    #[tokio::test]
    async fn scanner_url_enables_classifier() {
        let config = cli(&["--scanner-url", "http://127.0.0.1:5000"]);

        let services = build_services(&config, Arc::new(InMemoryStore::new())).unwrap();

        assert!(services.state.classifier.is_some());
    }
}
