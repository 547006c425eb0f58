//! Key resolution capability and the file-backed RSA key store.
//!
//! Each key lives in its own `<kid>.pem` file holding an RSA private key
//! (PKCS#1 `RSA PRIVATE KEY` or PKCS#8 `PRIVATE KEY`). The public half is
//! derived on demand and returned as a SubjectPublicKeyInfo `PUBLIC KEY` PEM.

use crate::errors::KeyLookupError;
use async_trait::async_trait;
use common::secret::SecretString;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on a single key file.
pub const MAX_KEY_FILE_BYTES: u64 = 1024 * 1024;

/// Source of signing and verification key material.
///
/// Implementations may hit disk or the network and may be slow; callers bound
/// each call with a deadline.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// PEM-encoded private key used to sign tokens for `kid`.
    async fn private_key(&self, kid: &str) -> Result<SecretString, KeyLookupError>;

    /// PEM-encoded public key used to verify tokens for `kid`.
    async fn public_key(&self, kid: &str) -> Result<String, KeyLookupError>;
}

/// Errors raised while loading a key directory.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {} exceeds 1 MiB", path.display())]
    TooLarge { path: PathBuf },

    #[error("key file {}: {source}", path.display())]
    InvalidKey {
        path: PathBuf,
        #[source]
        source: KeyLookupError,
    },
}

struct KeyRecord {
    private: RsaPrivateKey,
    pem: SecretString,
}

/// In-memory map of key id to RSA private key.
#[derive(Default)]
pub struct KeyStore {
    keys: HashMap<String, KeyRecord>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("kids", &self.kids())
            .finish()
    }
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `pem` and register it under `kid`, replacing any previous key.
    ///
    /// # Errors
    ///
    /// `KeyLookupError::InvalidKey` if `pem` is not an RSA private key.
    pub fn insert_pem(&mut self, kid: impl Into<String>, pem: &str) -> Result<(), KeyLookupError> {
        let private = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| KeyLookupError::InvalidKey(format!("parsing private pem: {e}")))?;

        self.keys.insert(
            kid.into(),
            KeyRecord {
                private,
                pem: SecretString::from(pem.to_string()),
            },
        );
        Ok(())
    }

    /// Load every `*.pem` file under `dir` (recursively). The file stem is the
    /// key id.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable, oversized, or unparsable key file.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let mut store = Self::new();
        let mut pending = vec![dir.as_ref().to_path_buf()];

        while let Some(current) = pending.pop() {
            let entries = std::fs::read_dir(&current).map_err(|source| KeyStoreError::Io {
                path: current.clone(),
                source,
            })?;

            for entry in entries {
                let entry = entry.map_err(|source| KeyStoreError::Io {
                    path: current.clone(),
                    source,
                })?;
                let path = entry.path();

                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|ext| ext.to_str()) != Some("pem") {
                    continue;
                }
                let Some(kid) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };

                let pem = read_capped(&path)?;
                store
                    .insert_pem(kid, &pem)
                    .map_err(|source| KeyStoreError::InvalidKey {
                        path: path.clone(),
                        source,
                    })?;

                tracing::debug!(target: "shortener.auth.keys", kid = %kid, "Loaded signing key");
            }
        }

        tracing::info!(
            target: "shortener.auth.keys",
            key_count = store.len(),
            dir = %dir.as_ref().display(),
            "Key store loaded"
        );

        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered key ids, sorted.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    fn record(&self, kid: &str) -> Result<&KeyRecord, KeyLookupError> {
        self.keys
            .get(kid)
            .ok_or_else(|| KeyLookupError::UnknownKey(kid.to_string()))
    }
}

#[async_trait]
impl KeyResolver for KeyStore {
    async fn private_key(&self, kid: &str) -> Result<SecretString, KeyLookupError> {
        Ok(self.record(kid)?.pem.clone())
    }

    async fn public_key(&self, kid: &str) -> Result<String, KeyLookupError> {
        self.record(kid)?
            .private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyLookupError::InvalidKey(format!("encoding public pem: {e}")))
    }
}

fn read_capped(path: &Path) -> Result<String, KeyStoreError> {
    let io_err = |source| KeyStoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut pem = String::new();
    file.take(MAX_KEY_FILE_BYTES + 1)
        .read_to_string(&mut pem)
        .map_err(io_err)?;

    if pem.len() as u64 > MAX_KEY_FILE_BYTES {
        return Err(KeyStoreError::TooLarge {
            path: path.to_path_buf(),
        });
    }
    Ok(pem)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;
    use rsa::pkcs8::EncodePrivateKey;
    use shortener_test_utils::crypto_fixtures::{PRIMARY_PRIVATE_PEM, SECONDARY_PRIVATE_PEM};

    #[tokio::test]
    async fn test_insert_pem_and_resolve() {
        let mut store = KeyStore::new();
        store.insert_pem("primary", PRIMARY_PRIVATE_PEM).unwrap();

        let private = store.private_key("primary").await.unwrap();
        assert_eq!(private.expose_secret(), PRIMARY_PRIVATE_PEM);

        let public = store.public_key("primary").await.unwrap();
        assert!(public.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let store = KeyStore::new();
        assert_eq!(
            store.public_key("nope").await.unwrap_err(),
            KeyLookupError::UnknownKey("nope".to_string())
        );
    }

    #[test]
    fn test_insert_pem_rejects_garbage() {
        let mut store = KeyStore::new();
        let err = store.insert_pem("bad", "not a pem").unwrap_err();
        assert!(matches!(err, KeyLookupError::InvalidKey(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_insert_pem_accepts_pkcs8() {
        let key = RsaPrivateKey::from_pkcs1_pem(PRIMARY_PRIVATE_PEM).unwrap();
        let pkcs8 = key.to_pkcs8_pem(LineEnding::LF).unwrap();

        let mut store = KeyStore::new();
        store.insert_pem("pkcs8", &pkcs8).unwrap();

        let mut reference = KeyStore::new();
        reference.insert_pem("pkcs1", PRIMARY_PRIVATE_PEM).unwrap();

        assert_eq!(
            store.public_key("pkcs8").await.unwrap(),
            reference.public_key("pkcs1").await.unwrap()
        );
    }

    #[test]
    fn test_from_dir_loads_pem_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alpha.pem"), PRIMARY_PRIVATE_PEM).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/beta.pem"), SECONDARY_PRIVATE_PEM).unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let store = KeyStore::from_dir(dir.path()).unwrap();

        assert_eq!(store.kids(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_from_dir_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let huge = "A".repeat(usize::try_from(MAX_KEY_FILE_BYTES).unwrap() + 1);
        std::fs::write(dir.path().join("huge.pem"), huge).unwrap();

        let err = KeyStore::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, KeyStoreError::TooLarge { .. }));
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let err = KeyStore::from_dir("/definitely/not/here").unwrap_err();
        assert!(matches!(err, KeyStoreError::Io { .. }));
    }

    #[test]
    fn test_debug_lists_kids_only() {
        let mut store = KeyStore::new();
        store.insert_pem("primary", PRIMARY_PRIVATE_PEM).unwrap();

        let debug = format!("{store:?}");
        assert!(debug.contains("primary"));
        assert!(!debug.contains("PRIVATE KEY"));
    }
}
