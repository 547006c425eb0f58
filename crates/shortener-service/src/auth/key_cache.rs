//! Memoizing cache of public verification keys.
//!
//! Lookups take the shared lock first and return on a hit. On a miss the lock
//! is released, the resolver is called (bounded by a deadline), and the result
//! is inserted under the exclusive lock.
//!
//! Concurrent misses for the same kid are NOT deduplicated: each one calls the
//! resolver. Entries are never expired or refreshed; rotating keys requires a
//! restart. Failed resolutions cache nothing.

use crate::auth::keystore::KeyResolver;
use crate::errors::KeyLookupError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::instrument;

/// Default deadline for a cold resolver call.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Public key cache keyed by kid.
pub struct KeyCache {
    resolver: Arc<dyn KeyResolver>,

    /// kid -> `PUBLIC KEY` PEM.
    entries: RwLock<HashMap<String, String>>,

    resolve_timeout: Duration,
}

impl KeyCache {
    /// Create an empty cache over `resolver`.
    pub fn new(resolver: Arc<dyn KeyResolver>, resolve_timeout: Duration) -> Self {
        Self {
            resolver,
            entries: RwLock::new(HashMap::new()),
            resolve_timeout,
        }
    }

    /// Return the public key PEM for `kid`, resolving it on first use.
    ///
    /// # Errors
    ///
    /// Whatever the resolver returns, or `KeyLookupError::Timeout` when the
    /// resolver does not answer within the configured deadline.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn lookup(&self, kid: &str) -> Result<String, KeyLookupError> {
        {
            let entries = self.entries.read().await;
            if let Some(pem) = entries.get(kid) {
                tracing::debug!(target: "shortener.auth.keys", kid = %kid, "Key cache hit");
                return Ok(pem.clone());
            }
        }

        tracing::debug!(target: "shortener.auth.keys", kid = %kid, "Key cache miss, resolving");

        let pem = match tokio::time::timeout(self.resolve_timeout, self.resolver.public_key(kid)).await {
            Ok(Ok(pem)) => pem,
            Ok(Err(e)) => {
                tracing::warn!(target: "shortener.auth.keys", kid = %kid, error = %e, "Public key resolution failed");
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(
                    target: "shortener.auth.keys",
                    kid = %kid,
                    timeout_ms = self.resolve_timeout.as_millis(),
                    "Public key resolution timed out"
                );
                return Err(KeyLookupError::Timeout(self.resolve_timeout));
            }
        };

        let mut entries = self.entries.write().await;
        entries.insert(kid.to_string(), pem.clone());

        Ok(pem)
    }

    /// Whether `kid` has been resolved successfully at least once.
    pub async fn contains(&self, kid: &str) -> bool {
        self.entries.read().await.contains_key(kid)
    }

    /// Number of cached keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::secret::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    /// Resolver that serves one fixed kid and counts public key calls.
    struct FakeResolver {
        kid: &'static str,
        calls: AtomicUsize,
        gate: Option<Arc<Barrier>>,
        delay: Duration,
    }

    impl FakeResolver {
        fn new(kid: &'static str) -> Self {
            Self {
                kid,
                calls: AtomicUsize::new(0),
                gate: None,
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyResolver for FakeResolver {
        async fn private_key(&self, kid: &str) -> Result<SecretString, KeyLookupError> {
            Err(KeyLookupError::UnknownKey(kid.to_string()))
        }

        async fn public_key(&self, kid: &str) -> Result<String, KeyLookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if kid == self.kid {
                Ok(format!("pem-for-{kid}"))
            } else {
                Err(KeyLookupError::UnknownKey(kid.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_warm_cache_stops_calling_resolver() {
        let resolver = Arc::new(FakeResolver::new("abc"));
        let cache = KeyCache::new(resolver.clone(), DEFAULT_RESOLVE_TIMEOUT);

        for _ in 0..5 {
            assert_eq!(cache.lookup("abc").await.unwrap(), "pem-for-abc");
        }

        assert_eq!(resolver.calls(), 1);
        assert!(cache.contains("abc").await);
    }

    #[tokio::test]
    async fn test_failed_resolution_is_not_cached() {
        let resolver = Arc::new(FakeResolver::new("abc"));
        let cache = KeyCache::new(resolver.clone(), DEFAULT_RESOLVE_TIMEOUT);

        for _ in 0..2 {
            assert_eq!(
                cache.lookup("missing").await.unwrap_err(),
                KeyLookupError::UnknownKey("missing".to_string())
            );
        }

        assert_eq!(resolver.calls(), 2);
        assert!(!cache.contains("missing").await);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_misses_each_call_resolver() {
        // Both lookups must be inside the resolver at the same time to pass the barrier.
        let resolver = Arc::new(FakeResolver {
            gate: Some(Arc::new(Barrier::new(2))),
            ..FakeResolver::new("abc")
        });
        let cache = Arc::new(KeyCache::new(resolver.clone(), DEFAULT_RESOLVE_TIMEOUT));

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.lookup("abc").await }
        });
        let second = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.lookup("abc").await }
        });

        assert_eq!(first.await.unwrap().unwrap(), "pem-for-abc");
        assert_eq!(second.await.unwrap().unwrap(), "pem-for-abc");

        assert_eq!(resolver.calls(), 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_slow_resolver_times_out_and_caches_nothing() {
        let resolver = Arc::new(FakeResolver {
            delay: Duration::from_secs(60),
            ..FakeResolver::new("abc")
        });
        let cache = KeyCache::new(resolver, Duration::from_millis(100));

        assert_eq!(
            cache.lookup("abc").await.unwrap_err(),
            KeyLookupError::Timeout(Duration::from_millis(100))
        );
        assert!(!cache.contains("abc").await);
    }
}
