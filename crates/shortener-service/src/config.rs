//! URL Shortener service configuration.
//!
//! Configuration is loaded from environment variables. Nothing here is
//! secret; key material lives in the files under `AUTH_KEYS_FOLDER`.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default build tag reported by the liveness probe.
pub const DEFAULT_BUILD: &str = "develop";

/// Default directory of `<kid>.pem` key files.
pub const DEFAULT_KEYS_FOLDER: &str = "zarf/keys/";

/// Default key id used by tooling to sign tokens.
pub const DEFAULT_ACTIVE_KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

/// Default required token issuer.
pub const DEFAULT_ISSUER: &str = "URL-Shortener";

/// Default deadline for a cold key resolution, in milliseconds.
pub const DEFAULT_KEY_RESOLVE_TIMEOUT_MS: u64 = 5000;

/// Default graceful drain bound, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 20;

/// Default per-request timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// URL Shortener configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Build tag reported by `/v1/liveness`.
    pub build: String,

    /// Directory holding one `<kid>.pem` RSA private key per key id.
    pub keys_folder: PathBuf,

    /// Key id the token tool signs with.
    pub active_kid: String,

    /// Issuer every accepted token must carry.
    pub issuer: String,

    /// How far in the future a token's `iat` may be.
    pub jwt_clock_skew: Duration,

    /// Deadline for one key resolver call.
    pub key_resolve_timeout: Duration,

    /// How long in-flight requests may drain after shutdown starts.
    pub shutdown_timeout: Duration,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let string_or = |name: &str, default: &str| {
            vars.get(name)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {value}",
                    MAX_CLOCK_SKEW.as_secs()
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let key_resolve_timeout = Duration::from_millis(positive_or(
            vars,
            "KEY_RESOLVE_TIMEOUT_MS",
            DEFAULT_KEY_RESOLVE_TIMEOUT_MS,
        )?);
        let shutdown_timeout = Duration::from_secs(positive_or(
            vars,
            "SHUTDOWN_TIMEOUT_SECONDS",
            DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
        )?);
        let request_timeout = Duration::from_secs(positive_or(
            vars,
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?);

        Ok(Config {
            bind_address: string_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            build: string_or("BUILD", DEFAULT_BUILD),
            keys_folder: PathBuf::from(string_or("AUTH_KEYS_FOLDER", DEFAULT_KEYS_FOLDER)),
            active_kid: string_or("AUTH_ACTIVE_KID", DEFAULT_ACTIVE_KID),
            issuer: string_or("AUTH_ISSUER", DEFAULT_ISSUER),
            jwt_clock_skew,
            key_resolve_timeout,
            shutdown_timeout,
            request_timeout,
        })
    }
}

/// Parse a strictly positive integer variable, or fall back to `default`.
fn positive_or(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{name} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{name} must be greater than 0"
        )));
    }

    Ok(value)
}
