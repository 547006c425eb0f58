//! Fixed RSA keys for testing.
//!
//! Generating 2048-bit RSA keys is slow, so tests share two PKCS#1 keys
//! checked in under `fixtures/`.

use shortener_service::auth::KeyStore;

/// Key id the harness registers [`PRIMARY_PRIVATE_PEM`] under.
pub const PRIMARY_KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

/// Key id the harness registers [`SECONDARY_PRIVATE_PEM`] under.
pub const SECONDARY_KID: &str = "secondary";

/// Issuer the harness requires.
pub const TEST_ISSUER: &str = "URL-Shortener";

/// PKCS#1 RSA private key.
pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../fixtures/primary.pem");

/// A second PKCS#1 RSA private key, unrelated to the primary one.
pub const SECONDARY_PRIVATE_PEM: &str = include_str!("../fixtures/secondary.pem");

/// A key store holding both fixture keys under their fixture kids.
pub fn fixture_key_store() -> KeyStore {
    key_store(&[
        (PRIMARY_KID, PRIMARY_PRIVATE_PEM),
        (SECONDARY_KID, SECONDARY_PRIVATE_PEM),
    ])
}

/// A key store holding exactly `keys`.
///
/// # Panics
///
/// Panics if any PEM fails to parse.
pub fn key_store(keys: &[(&str, &str)]) -> KeyStore {
    let mut store = KeyStore::new();
    for (kid, pem) in keys {
        store
            .insert_pem(*kid, pem)
            .unwrap_or_else(|e| panic!("fixture key {kid} should parse: {e}"));
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_keys_load() {
        let store = fixture_key_store();
        assert_eq!(store.kids(), vec![PRIMARY_KID, SECONDARY_KID]);
    }

    #[test]
    fn test_fixture_keys_differ() {
        assert_ne!(PRIMARY_PRIVATE_PEM, SECONDARY_PRIVATE_PEM);
        assert!(PRIMARY_PRIVATE_PEM.contains("BEGIN RSA PRIVATE KEY"));
    }
}
