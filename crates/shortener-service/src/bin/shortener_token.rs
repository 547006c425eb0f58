//! Key and token tooling.
//!
//! Ensures `<AUTH_KEYS_FOLDER>/<AUTH_ACTIVE_KID>.pem` exists (generating a
//! 2048-bit RSA key when it does not), issues a one-year `ADMIN` token for
//! subject `1234`, verifies it, and prints both the token and its claims.

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use shortener_service::auth::{AllowAllPrincipals, AuthSession, Claims, KeyStore, Role};
use shortener_service::config::Config;
use shortener_service::observability;
use std::fs::OpenOptions;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Key size used when the active key is missing.
const KEY_BITS: usize = 2048;

/// Lifetime of the issued token.
const TOKEN_TTL: Duration = Duration::from_secs(8760 * 60 * 60);

/// Subject of the issued token.
const TOKEN_SUBJECT: &str = "1234";

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let config = Config::from_env().context("loading configuration")?;

    let key_path = config.keys_folder.join(format!("{}.pem", config.active_kid));
    ensure_key(&key_path)?;

    let store = KeyStore::from_dir(&config.keys_folder)
        .with_context(|| format!("loading keys from {}", config.keys_folder.display()))?;

    let session = AuthSession::new(
        config.issuer.clone(),
        Arc::new(store),
        Arc::new(AllowAllPrincipals),
    )
    .with_clock_skew(config.jwt_clock_skew)
    .with_resolve_timeout(config.key_resolve_timeout);

    let claims = Claims::issued_now(
        TOKEN_SUBJECT,
        config.issuer.clone(),
        TOKEN_TTL,
        [Role::Admin.as_str()],
    );
    let token = session
        .issue(&config.active_kid, &claims)
        .await
        .context("signing token")?;

    println!("*******************");
    println!("{token}");
    println!("*******************");

    let verified = session
        .authenticate(&format!("Bearer {token}"))
        .await
        .context("verifying token")?;

    println!("SIGNATURE VALIDATED");
    println!("{}", serde_json::to_string_pretty(&verified)?);
    println!("*******************");

    Ok(())
}

/// Generate and write a PKCS#1 private key at `path` unless one exists.
fn ensure_key(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating keys directory {}", dir.display()))?;
    }

    tracing::info!(path = %path.display(), "Generating private key");
    let key = RsaPrivateKey::new(&mut OsRng, KEY_BITS).context("generating RSA key")?;
    let pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .context("encoding private key")?;

    write_private_key(path, pem.as_bytes())
        .with_context(|| format!("writing private key to {}", path.display()))?;

    Ok(())
}

/// Create `path` readable by the owner only and write `pem` into it.
fn write_private_key(path: &Path, pem: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    options.open(path)?.write_all(pem)
}
