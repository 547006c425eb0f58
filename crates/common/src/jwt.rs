//! JWT utilities shared across URL Shortener components.
//!
//! This module provides the framework-free parts of bearer token handling:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Unverified structural decoding of a compact JWS
//! - Key ID lookup on the unverified header
//! - iat validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing in this module verifies a signature; callers MUST verify the
//!   token with the key selected by `kid` before trusting any claim
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let unverified = decode_unverified(token)?;
//! let kid = unverified.kid()?;
//!
//! // ...fetch the key for `kid` and verify the signature...
//!
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// # Rationale
///
/// - An RS256 token with a 2048-bit key and a handful of roles is ~600 bytes
/// - 8KB leaves room for larger keys and claim sets while preventing abuse
/// - Checked BEFORE base64 decode and signature verification for efficiency
///
/// Per OWASP API Security Top 10 - API4:2023 (Unrestricted Resource Consumption)
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_mins(5);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration validation.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_mins(10);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT structural validation.
///
/// Note: Display messages are intentionally generic to prevent information
/// leakage. Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid compact JWS structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header has no `kid` field.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token header has a `kid` that is not a non-empty string.
    #[error("The access token is invalid or expired")]
    MalformedKid,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Unverified token
// =============================================================================

/// The decoded header and claims of a JWT whose signature has NOT been checked.
///
/// Only useful for routing decisions such as picking the verification key.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    header: Map<String, Value>,
    claims: Map<String, Value>,
}

impl UnverifiedToken {
    /// The raw JOSE header.
    #[must_use]
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// The raw, untrusted claims object.
    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// The `kid` header value.
    ///
    /// # Errors
    ///
    /// - `MissingKid` - the header has no `kid` field
    /// - `MalformedKid` - `kid` is not a string, or is empty
    pub fn kid(&self) -> Result<&str, JwtValidationError> {
        let raw = self.header.get("kid").ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "Token rejected: kid missing from header");
            JwtValidationError::MissingKid
        })?;

        // Empty kid rejected for defense-in-depth
        raw.as_str().filter(|kid| !kid.is_empty()).ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "Token rejected: kid is not a non-empty string");
            JwtValidationError::MalformedKid
        })
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the header and claims of a compact JWS without verifying it.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - not three dot-separated segments, bad base64url, or a
///   header/claims segment that is not a JSON object
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(claims_part), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    Ok(UnverifiedToken {
        header: decode_segment(header_part, "header")?,
        claims: decode_segment(claims_part, "claims")?,
    })
}

fn decode_segment(segment: &str, name: &str) -> Result<Map<String, Value>, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(target: "common.jwt", segment = name, "JWT segment is not a JSON object");
            Err(JwtValidationError::MalformedToken)
        }
        Err(e) => {
            tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to parse JWT segment JSON");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which could indicate
/// token pre-generation or clock synchronization issues.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let claims_b64 = URL_SAFE_NO_PAD.encode(r#"{"sub":"1234","iss":"URL-Shortener"}"#);
        format!("{header_b64}.{claims_b64}.signature")
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_clock_skew_bounds() {
        assert_eq!(DEFAULT_CLOCK_SKEW.as_secs(), 300);
        assert_eq!(MAX_CLOCK_SKEW.as_secs(), 600);
    }

    // -------------------------------------------------------------------------
    // decode_unverified Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_unverified_exposes_header_and_claims() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"abc"}"#);

        let unverified = decode_unverified(&token).unwrap();

        assert_eq!(unverified.header()["alg"], "RS256");
        assert_eq!(unverified.claims()["iss"], "URL-Shortener");
    }

    #[test]
    fn test_decode_unverified_wrong_segment_count() {
        for token in ["single", "only.two", "a.b.c.d", ""] {
            assert_eq!(
                decode_unverified(token).unwrap_err(),
                JwtValidationError::MalformedToken,
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_decode_unverified_invalid_base64() {
        let result = decode_unverified("!!!invalid!!!.payload.signature");
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_decode_unverified_claims_not_an_object() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"abc"}"#);
        let claims_b64 = URL_SAFE_NO_PAD.encode("[1,2,3]");
        let token = format!("{header_b64}.{claims_b64}.sig");

        assert_eq!(
            decode_unverified(&token).unwrap_err(),
            JwtValidationError::MalformedToken
        );
    }

    #[test]
    fn test_decode_unverified_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            decode_unverified(&oversized).unwrap_err(),
            JwtValidationError::TokenTooLarge
        );
    }

    // -------------------------------------------------------------------------
    // kid Tests
    // -------------------------------------------------------------------------

    fn kid_of(token: &str) -> Result<String, JwtValidationError> {
        decode_unverified(token)?.kid().map(ToString::to_string)
    }

    #[test]
    fn test_kid_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"test-key-01"}"#);
        assert_eq!(kid_of(&token).unwrap(), "test-key-01");
    }

    #[test]
    fn test_kid_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);
        assert_eq!(
            kid_of(&token).unwrap_err(),
            JwtValidationError::MissingKid
        );
    }

    #[test]
    fn test_kid_non_string_kid() {
        for header in [
            r#"{"alg":"RS256","kid":12345}"#,
            r#"{"alg":"RS256","kid":null}"#,
            r#"{"alg":"RS256","kid":["abc"]}"#,
            r#"{"alg":"RS256","kid":""}"#,
        ] {
            let token = token_with_header(header);
            assert_eq!(
                kid_of(&token).unwrap_err(),
                JwtValidationError::MalformedKid,
                "header {header} should yield MalformedKid"
            );
        }
    }

    #[test]
    fn test_kid_malformed_token() {
        assert_eq!(
            kid_of("not-a-jwt").unwrap_err(),
            JwtValidationError::MalformedToken
        );
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_and_past_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now - 3600, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert_eq!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::IatTooFarInFuture
        );
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());

        // iat == now + skew + 1 is the first rejected value
        assert_eq!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now).unwrap_err(),
            JwtValidationError::IatTooFarInFuture
        );
    }
}
