use std::sync::Arc;
use std::time::Duration;

use crate::{Classifier, Verdict};
use async_trait::async_trait;
use linkhop_core::{KeySpace, KeyValueStore, NormalizedUrl};
use tracing::{trace, warn};

pub const DEFAULT_VERDICT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Keeps definite verdicts of an inner classifier in the store.
///
/// Verdicts are stored as `"true"` (malicious) or `"false"` under the
/// ScanVerdict key of the URL. [`Verdict::Unknown`] is never cached, so a
/// scanner outage is retried on the next request. Store failures are logged
/// and bypass the cache.
#[derive(Debug, Clone)]
pub struct CachedClassifier<K, S> {
    inner: K,
    store: Arc<S>,
    keys: KeySpace,
    ttl: Duration,
}

impl<K: Classifier, S: KeyValueStore> CachedClassifier<K, S> {
    pub fn new(inner: K, store: S) -> Self {
        Self {
            inner,
            store: Arc::new(store),
            keys: KeySpace::default(),
            ttl: DEFAULT_VERDICT_TTL,
        }
    }

    pub fn with_keys(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    async fn cached(&self, key: &str) -> Option<Verdict> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match raw.as_str() {
                "true" => Some(Verdict::Malicious),
                "false" => Some(Verdict::Benign),
                other => {
                    warn!(key, value = other, "ignoring unreadable cached verdict");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "verdict cache read failed");
                None
            }
        }
    }
}

#[async_trait]
impl<K: Classifier, S: KeyValueStore> Classifier for CachedClassifier<K, S> {
    async fn classify(&self, url: &NormalizedUrl) -> Verdict {
        let key = self.keys.scan(url);

        if let Some(verdict) = self.cached(&key).await {
            trace!(url = %url, verdict = %verdict, "verdict cache hit");
            return verdict;
        }

        let verdict = self.inner.classify(url).await;
        let value = match verdict {
            Verdict::Malicious => "true",
            Verdict::Benign => "false",
            Verdict::Unknown => return verdict,
        };

        if let Err(e) = self.store.set(&key, value, Some(self.ttl)).await {
            warn!(url = %url, error = %e, "verdict cache write failed");
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkhop_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed verdict and counts calls.
    struct Stub {
        verdict: Verdict,
        calls: AtomicUsize,
    }

    impl Stub {
        fn new(verdict: Verdict) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for Stub {
        async fn classify(&self, _: &NormalizedUrl) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
    }

    fn url() -> NormalizedUrl {
        NormalizedUrl::new_unchecked("https://bad.example/login")
    }

    #[tokio::test]
    async fn caches_definite_verdicts() {
        let store = InMemoryStore::new();
        let stub = Stub::new(Verdict::Malicious);
        let classifier = CachedClassifier::new(Arc::clone(&stub), store.clone());

        assert_eq!(classifier.classify(&url()).await, Verdict::Malicious);
        assert_eq!(classifier.classify(&url()).await, Verdict::Malicious);

        assert_eq!(stub.calls(), 1);
        let key = KeySpace::default().scan(&url());
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("true"));
        let ttl = store.ttl(&key).unwrap();
        assert!(ttl.as_secs() > 23 * 60 * 60);
    }

    #[tokio::test]
    async fn benign_is_cached_as_false() {
        let store = InMemoryStore::new();
        let classifier = CachedClassifier::new(Stub::new(Verdict::Benign), store.clone());

        assert_eq!(classifier.classify(&url()).await, Verdict::Benign);
        assert_eq!(
            store
                .get(&KeySpace::default().scan(&url()))
                .await
                .unwrap()
                .as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn unknown_is_not_cached() {
        let store = InMemoryStore::new();
        let stub = Stub::new(Verdict::Unknown);
        let classifier = CachedClassifier::new(Arc::clone(&stub), store.clone());

        assert_eq!(classifier.classify(&url()).await, Verdict::Unknown);
        assert_eq!(classifier.classify(&url()).await, Verdict::Unknown);

        assert_eq!(stub.calls(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn preexisting_entry_skips_scanner() {
        let store = InMemoryStore::new();
        store
            .set(&KeySpace::default().scan(&url()), "false", None)
            .await
            .unwrap();
        let stub = Stub::new(Verdict::Malicious);
        let classifier = CachedClassifier::new(Arc::clone(&stub), store);

        assert_eq!(classifier.classify(&url()).await, Verdict::Benign);
        assert_eq!(stub.calls(), 0);
    }
}
