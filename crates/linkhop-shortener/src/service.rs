use crate::error::{Result, ShortenerError};
use crate::generator::Generator;
use crate::hash::content_hash;
use async_trait::async_trait;
use linkhop_core::{KeySpace, KeyValueStore, NormalizedUrl, ShortId, StoreError};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the canonical short id of `url`, allocating one if the URL has
    /// never been submitted.
    async fn resolve_or_create(&self, url: &NormalizedUrl) -> Result<ShortId>;
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// Bound on candidate ids tried, and on hash index publish rounds.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
    #[builder(default)]
    pub keys: KeySpace,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ShortenerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ShortenerError::InvalidConfig(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deduplicating allocator on top of a [`KeyValueStore`].
///
/// Allocation is a compare-and-swap sequence over two keys:
///
/// 1. the ShortLink for a fresh candidate is claimed with set-if-absent,
///    retrying with new candidates on collision;
/// 2. the HashIndex entry is published with set-if-absent. The first
///    publisher wins; everyone else re-reads the index and returns the
///    winner's id. A losing ShortLink stays behind as a harmless orphan.
///
/// No step relies on a read followed by an unconditional write, so concurrent
/// submissions of one URL always agree on a single id.
#[derive(Debug, Clone)]
pub struct ShortenerService<S, G> {
    store: Arc<S>,
    generator: Arc<G>,
    settings: ShortenerSettings,
}

impl<S: KeyValueStore, G: Generator> ShortenerService<S, G> {
    pub fn new(store: S, generator: G) -> Self {
        Self {
            store: Arc::new(store),
            generator: Arc::new(generator),
            settings: ShortenerSettings::default(),
        }
    }

    pub fn with_settings(store: S, generator: G, settings: ShortenerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store: Arc::new(store),
            generator: Arc::new(generator),
            settings,
        })
    }

    /// Looks up the short id already assigned to `url`, without allocating.
    pub async fn lookup(&self, url: &NormalizedUrl) -> Result<Option<ShortId>> {
        let hash_key = self.settings.keys.hash(&content_hash(url));
        match self.store.get(&hash_key).await? {
            Some(raw) => Ok(Some(parse_stored(&hash_key, raw)?)),
            None => Ok(None),
        }
    }

    /// Claims a ShortLink for `url` under a fresh candidate id.
    async fn claim_link(&self, url: &NormalizedUrl) -> Result<ShortId> {
        let attempts = self.settings.max_attempts;

        for attempt in 1..=attempts {
            let candidate: ShortId = self.generator.generate().into();
            let link_key = self.settings.keys.link(&candidate);

            match self.store.set_if_absent(&link_key, url.as_str()).await {
                Ok(true) => {
                    trace!(code = %candidate, attempt, "claimed short link");
                    return Ok(candidate);
                }
                Ok(false) => {}
                Err(e) if e.is_ambiguous() => {
                    warn!(code = %candidate, error = %e, "short link claim outcome unknown, re-reading");
                }
                Err(e) => return Err(e.into()),
            }

            // Either the id is taken or our write may have landed. The
            // stored value decides which.
            match self.store.get(&link_key).await? {
                Some(existing) if existing == url.as_str() => {
                    debug!(code = %candidate, attempt, "short link already maps to this url");
                    return Ok(candidate);
                }
                Some(_) => debug!(code = %candidate, attempt, "short id collision, retrying"),
                None => debug!(code = %candidate, attempt, "short link claim not applied, retrying"),
            }
        }

        warn!(attempts, "short id allocation exhausted");
        Err(ShortenerError::AllocationExhausted { attempts })
    }

    /// Publishes `candidate` as the canonical id for `hash_key`, or adopts
    /// the id another caller published first.
    async fn publish(&self, hash_key: &str, candidate: ShortId) -> Result<ShortId> {
        let attempts = self.settings.max_attempts;

        for _ in 0..attempts {
            match self.store.set_if_absent(hash_key, candidate.as_str()).await {
                Ok(true) => {
                    debug!(code = %candidate, "published hash index entry");
                    return Ok(candidate);
                }
                Ok(false) => {}
                Err(e) if e.is_ambiguous() => {
                    warn!(code = %candidate, error = %e, "hash index publish outcome unknown, re-reading");
                }
                Err(e) => return Err(e.into()),
            }

            if let Some(raw) = self.store.get(hash_key).await? {
                let winner = parse_stored(hash_key, raw)?;
                if winner != candidate {
                    debug!(
                        code = %winner,
                        orphan = %candidate,
                        "lost publish race, adopting existing short id"
                    );
                }
                return Ok(winner);
            }
        }

        warn!(attempts, "hash index publish exhausted");
        Err(ShortenerError::AllocationExhausted { attempts })
    }
}

#[async_trait]
impl<S: KeyValueStore, G: Generator> Shortener for ShortenerService<S, G> {
    async fn resolve_or_create(&self, url: &NormalizedUrl) -> Result<ShortId> {
        let hash_key = self.settings.keys.hash(&content_hash(url));

        if let Some(raw) = self.store.get(&hash_key).await? {
            let existing = parse_stored(&hash_key, raw)?;
            debug!(code = %existing, "url already shortened");
            return Ok(existing);
        }

        let candidate = self.claim_link(url).await?;
        self.publish(&hash_key, candidate).await
    }
}

fn parse_stored(key: &str, raw: String) -> Result<ShortId> {
    ShortId::new(raw).map_err(|e| {
        ShortenerError::Store(StoreError::InvalidData(format!(
            "key '{key}' holds an invalid short id: {e}"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::random::RandomGenerator;
    use linkhop_store::InMemoryStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Hands out a fixed list of ids, repeating the last one.
    struct ScriptedGenerator {
        ids: Mutex<VecDeque<&'static str>>,
        last: &'static str,
    }

    impl ScriptedGenerator {
        fn new(ids: &[&'static str]) -> Self {
            Self {
                ids: Mutex::new(ids.iter().copied().collect()),
                last: ids[ids.len() - 1],
            }
        }
    }

    impl Generator for ScriptedGenerator {
        type Output = ShortId;

        fn generate(&self) -> ShortId {
            let next = self.ids.lock().unwrap().pop_front().unwrap_or(self.last);
            ShortId::new_unchecked(next)
        }
    }

    /// Wraps an [`InMemoryStore`] and injects the failures a networked store
    /// can produce.
    #[derive(Default)]
    struct FaultyStore {
        inner: InMemoryStore,
        /// The first read of a hash index key misses, as if a concurrent
        /// caller published right after it.
        stale_first_hash_read: AtomicBool,
        /// Writes are applied but the first one of each kind reports a timeout.
        timeout_after_link_claim: AtomicBool,
        timeout_after_hash_publish: AtomicBool,
        unavailable: bool,
    }

    impl FaultyStore {
        fn check(&self) -> linkhop_core::error::Result<()> {
            if self.unavailable {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KeyValueStore for FaultyStore {
        async fn get(&self, key: &str) -> linkhop_core::error::Result<Option<String>> {
            self.check()?;
            if key.contains(":hash:") && self.stale_first_hash_read.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get(key).await
        }

        async fn set(
            &self,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> linkhop_core::error::Result<()> {
            self.check()?;
            self.inner.set(key, value, ttl).await
        }

        async fn set_if_absent(&self, key: &str, value: &str) -> linkhop_core::error::Result<bool> {
            self.check()?;
            let written = self.inner.set_if_absent(key, value).await?;
            let flag = if key.contains(":link:") {
                &self.timeout_after_link_claim
            } else {
                &self.timeout_after_hash_publish
            };
            if flag.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Timeout("no reply".to_string()));
            }
            Ok(written)
        }

        async fn incr(&self, key: &str) -> linkhop_core::error::Result<i64> {
            self.check()?;
            self.inner.incr(key).await
        }

        async fn push(&self, key: &str, value: &str) -> linkhop_core::error::Result<u64> {
            self.check()?;
            self.inner.push(key, value).await
        }

        async fn range(
            &self,
            key: &str,
            start: i64,
            stop: i64,
        ) -> linkhop_core::error::Result<Vec<String>> {
            self.check()?;
            self.inner.range(key, start, stop).await
        }

        async fn trim(&self, key: &str, start: i64, stop: i64) -> linkhop_core::error::Result<()> {
            self.check()?;
            self.inner.trim(key, start, stop).await
        }

        async fn expire(&self, key: &str, ttl: Duration) -> linkhop_core::error::Result<bool> {
            self.check()?;
            self.inner.expire(key, ttl).await
        }

        async fn admit_in_window(
            &self,
            key: &str,
            now_ms: i64,
            window: Duration,
            limit: u64,
        ) -> linkhop_core::error::Result<linkhop_core::WindowAdmission> {
            self.check()?;
            self.inner.admit_in_window(key, now_ms, window, limit).await
        }
    }

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::new_unchecked(s)
    }

    fn keys() -> KeySpace {
        KeySpace::default()
    }

    #[tokio::test]
    async fn creates_link_and_hash_index() {
        let store = InMemoryStore::new();
        let service = ShortenerService::new(store.clone(), RandomGenerator::new());
        let u = url("https://example.com/page");

        let id = service.resolve_or_create(&u).await.unwrap();

        assert_eq!(id.as_str().len(), 7);
        assert_eq!(
            store.get(&keys().link(&id)).await.unwrap().as_deref(),
            Some("https://example.com/page")
        );
        assert_eq!(
            store
                .get(&keys().hash(&content_hash(&u)))
                .await
                .unwrap()
                .as_deref(),
            Some(id.as_str())
        );
    }

    #[tokio::test]
    async fn repeated_submission_returns_same_id() {
        let store = InMemoryStore::new();
        let service = ShortenerService::new(store.clone(), RandomGenerator::new());
        let u = url("https://example.com/page");

        let first = service.resolve_or_create(&u).await.unwrap();
        let second = service.resolve_or_create(&u).await.unwrap();

        assert_eq!(first, second);
        // one ShortLink and one HashIndex entry
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn different_urls_get_different_ids() {
        let service = ShortenerService::new(InMemoryStore::new(), RandomGenerator::new());

        let a = service.resolve_or_create(&url("https://a.example/")).await.unwrap();
        let b = service.resolve_or_create(&url("https://b.example/")).await.unwrap();

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn lookup_does_not_allocate() {
        let store = InMemoryStore::new();
        let service = ShortenerService::new(store.clone(), RandomGenerator::new());
        let u = url("https://example.com/");

        assert!(service.lookup(&u).await.unwrap().is_none());
        assert!(store.is_empty());

        let id = service.resolve_or_create(&u).await.unwrap();
        assert_eq!(service.lookup(&u).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn concurrent_submissions_agree_on_one_id() {
        let store = InMemoryStore::new();
        let service = Arc::new(ShortenerService::new(
            store.clone(),
            RandomGenerator::new(),
        ));
        let u = url("https://example.com/hot");
        let mut handles = vec![];

        for _ in 0..32 {
            let service = Arc::clone(&service);
            let u = u.clone();
            handles.push(tokio::spawn(async move {
                service.resolve_or_create(&u).await.unwrap()
            }));
        }

        let mut ids = vec![];
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        let canonical = store
            .get(&keys().hash(&content_hash(&u)))
            .await
            .unwrap()
            .unwrap();
        assert!(ids.iter().all(|id| id.as_str() == canonical));
        assert_eq!(
            store
                .get(&keys().link(&ids[0]))
                .await
                .unwrap()
                .as_deref(),
            Some("https://example.com/hot")
        );
    }

    #[tokio::test]
    async fn collision_retries_without_overwriting() {
        let store = InMemoryStore::new();
        let taken = ShortId::new_unchecked("aaaaaaa");
        store
            .set(&keys().link(&taken), "https://other.example/", None)
            .await
            .unwrap();

        let service = ShortenerService::new(
            store.clone(),
            ScriptedGenerator::new(&["aaaaaaa", "bbbbbbb"]),
        );

        let id = service
            .resolve_or_create(&url("https://example.com/"))
            .await
            .unwrap();

        assert_eq!(id.as_str(), "bbbbbbb");
        assert_eq!(
            store.get(&keys().link(&taken)).await.unwrap().as_deref(),
            Some("https://other.example/")
        );
    }

    #[tokio::test]
    async fn allocation_exhausted_after_bounded_attempts() {
        let store = InMemoryStore::new();
        let taken = ShortId::new_unchecked("aaaaaaa");
        store
            .set(&keys().link(&taken), "https://other.example/", None)
            .await
            .unwrap();

        let settings = ShortenerSettings::builder().max_attempts(3).build();
        let service = ShortenerService::with_settings(
            store.clone(),
            ScriptedGenerator::new(&["aaaaaaa"]),
            settings,
        )
        .unwrap();

        let err = service
            .resolve_or_create(&url("https://example.com/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::AllocationExhausted { attempts: 3 }));
        assert!(err.is_retryable());
        assert_eq!(
            store.get(&keys().link(&taken)).await.unwrap().as_deref(),
            Some("https://other.example/")
        );
    }

    #[tokio::test]
    async fn race_loser_adopts_published_id() {
        let store = FaultyStore {
            stale_first_hash_read: AtomicBool::new(true),
            ..FaultyStore::default()
        };
        let inner = store.inner.clone();
        let u = url("https://example.com/");
        let winner = ShortId::new_unchecked("winner1");
        inner.set(&keys().link(&winner), u.as_str(), None).await.unwrap();
        inner
            .set(&keys().hash(&content_hash(&u)), winner.as_str(), None)
            .await
            .unwrap();

        let service = ShortenerService::new(store, ScriptedGenerator::new(&["loser01"]));

        let id = service.resolve_or_create(&u).await.unwrap();

        assert_eq!(id, winner);
        // the losing claim is left as an orphan that still resolves correctly
        assert_eq!(
            inner
                .get(&keys().link(&ShortId::new_unchecked("loser01")))
                .await
                .unwrap()
                .as_deref(),
            Some(u.as_str())
        );
    }

    #[tokio::test]
    async fn timed_out_link_claim_is_rechecked() {
        let store = FaultyStore {
            timeout_after_link_claim: AtomicBool::new(true),
            ..FaultyStore::default()
        };
        let inner = store.inner.clone();
        let service = ShortenerService::new(
            store,
            ScriptedGenerator::new(&["aaaaaaa", "bbbbbbb"]),
        );

        let id = service
            .resolve_or_create(&url("https://example.com/"))
            .await
            .unwrap();

        // the write landed despite the timeout, so the first candidate is kept
        assert_eq!(id.as_str(), "aaaaaaa");
        assert!(inner
            .get(&keys().link(&ShortId::new_unchecked("bbbbbbb")))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn timed_out_publish_is_rechecked() {
        let store = FaultyStore {
            timeout_after_hash_publish: AtomicBool::new(true),
            ..FaultyStore::default()
        };
        let inner = store.inner.clone();
        let u = url("https://example.com/");
        let service = ShortenerService::new(store, ScriptedGenerator::new(&["aaaaaaa"]));

        let id = service.resolve_or_create(&u).await.unwrap();

        assert_eq!(id.as_str(), "aaaaaaa");
        assert_eq!(
            inner
                .get(&keys().hash(&content_hash(&u)))
                .await
                .unwrap()
                .as_deref(),
            Some("aaaaaaa")
        );
    }

    #[tokio::test]
    async fn unavailable_store_is_retryable_error() {
        let store = FaultyStore {
            unavailable: true,
            ..FaultyStore::default()
        };
        let service = ShortenerService::new(store, RandomGenerator::new());

        let err = service
            .resolve_or_create(&url("https://example.com/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Store(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn corrupt_index_value_is_reported() {
        let store = InMemoryStore::new();
        let u = url("https://example.com/");
        store
            .set(&keys().hash(&content_hash(&u)), "not a short id", None)
            .await
            .unwrap();
        let service = ShortenerService::new(store, RandomGenerator::new());

        let err = service.resolve_or_create(&u).await.unwrap_err();

        assert!(matches!(err, ShortenerError::Store(StoreError::InvalidData(_))));
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let settings = ShortenerSettings::builder().max_attempts(0).build();

        let err = ShortenerService::with_settings(
            InMemoryStore::new(),
            RandomGenerator::new(),
            settings,
        )
        .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidConfig(_)));
        assert!(!err.is_retryable());
    }
}
