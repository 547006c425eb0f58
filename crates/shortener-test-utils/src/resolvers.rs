//! Key resolver and principal directory doubles.

use async_trait::async_trait;
use common::secret::SecretString;
use shortener_service::auth::{Claims, EnablementCheck, KeyResolver, KeyStore};
use shortener_service::errors::{KeyLookupError, PrincipalRejected};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Wraps a [`KeyStore`] and counts calls per operation.
pub struct CountingResolver {
    inner: KeyStore,
    public_calls: AtomicUsize,
    private_calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new(inner: KeyStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            public_calls: AtomicUsize::new(0),
            private_calls: AtomicUsize::new(0),
        })
    }

    /// Number of `public_key` calls so far.
    pub fn public_calls(&self) -> usize {
        self.public_calls.load(Ordering::SeqCst)
    }

    /// Number of `private_key` calls so far.
    pub fn private_calls(&self) -> usize {
        self.private_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyResolver for CountingResolver {
    async fn private_key(&self, kid: &str) -> Result<SecretString, KeyLookupError> {
        self.private_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.private_key(kid).await
    }

    async fn public_key(&self, kid: &str) -> Result<String, KeyLookupError> {
        self.public_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.public_key(kid).await
    }
}

/// Fails every lookup with the same error.
pub struct FailingResolver {
    error: KeyLookupError,
}

impl FailingResolver {
    pub fn new(error: KeyLookupError) -> Arc<Self> {
        Arc::new(Self { error })
    }

    /// A resolver whose backing store is down.
    pub fn unavailable() -> Arc<Self> {
        Self::new(KeyLookupError::Unavailable("key store offline".to_string()))
    }
}

#[async_trait]
impl KeyResolver for FailingResolver {
    async fn private_key(&self, _kid: &str) -> Result<SecretString, KeyLookupError> {
        Err(self.error.clone())
    }

    async fn public_key(&self, _kid: &str) -> Result<String, KeyLookupError> {
        Err(self.error.clone())
    }
}

/// In-memory principal enablement keyed by subject.
///
/// Subjects never added are `Unknown`.
#[derive(Default)]
pub struct PrincipalDirectory {
    enabled: Mutex<HashMap<String, bool>>,
}

impl PrincipalDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record `subject` as enabled or disabled.
    pub fn set_enabled(&self, subject: &str, enabled: bool) {
        self.enabled
            .lock()
            .unwrap()
            .insert(subject.to_string(), enabled);
    }
}

#[async_trait]
impl EnablementCheck for PrincipalDirectory {
    async fn check(&self, claims: &Claims) -> Result<(), PrincipalRejected> {
        match self.enabled.lock().unwrap().get(&claims.sub) {
            Some(true) => Ok(()),
            Some(false) => Err(PrincipalRejected::Disabled),
            None => Err(PrincipalRejected::Unknown),
        }
    }
}
