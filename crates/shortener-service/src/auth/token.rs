//! RS256 token signing and verification.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention, via `common::jwt`)
//! - Only RS256 is accepted; the header `alg` cannot downgrade verification
//! - Expiration is always validated; `iat` is validated with clock skew
//!   tolerance
//! - The issuer is NOT checked here so callers can report it separately

use crate::auth::claims::Claims;
use crate::errors::{AuthError, KeyLookupError};
use common::jwt::{decode_unverified, validate_iat, UnverifiedToken, DEFAULT_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

/// The only signing algorithm issued or accepted.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Stateless RS256 codec.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    clock_skew: Duration,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_SKEW)
    }
}

impl TokenCodec {
    /// # Arguments
    ///
    /// * `clock_skew` - how far in the future `iat` may be
    pub fn new(clock_skew: Duration) -> Self {
        Self { clock_skew }
    }

    /// Sign `claims` with `private_pem`, embedding `kid` in the header.
    ///
    /// # Errors
    ///
    /// `AuthError::Signing` if the key cannot be parsed or signing fails.
    pub fn sign(
        &self,
        kid: &str,
        claims: &Claims,
        private_pem: &SecretString,
    ) -> Result<String, AuthError> {
        let key = EncodingKey::from_rsa_pem(private_pem.expose_secret().as_bytes())
            .map_err(|e| AuthError::Signing(format!("parsing private pem: {e}")))?;

        let mut header = Header::new(SIGNING_ALGORITHM);
        header.kid = Some(kid.to_string());

        encode(&header, claims, &key).map_err(|e| AuthError::Signing(format!("signing token: {e}")))
    }

    /// Decode the token structure without verifying the signature.
    ///
    /// # Errors
    ///
    /// `AuthError::TokenStructureInvalid` for oversized or malformed tokens.
    pub fn parse_unverified(&self, token: &str) -> Result<UnverifiedToken, AuthError> {
        decode_unverified(token).map_err(|e| {
            tracing::debug!(target: "shortener.auth.token", error = ?e, "Token structure rejected");
            AuthError::TokenStructureInvalid(format!("{e:?}"))
        })
    }

    /// Verify `token` against `public_pem` and return its claims.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyResolution(InvalidKey)` - `public_pem` is not an RSA public key
    /// - `AuthError::SignatureOrClaimsInvalid` - bad signature, wrong algorithm,
    ///   expired, missing/mistyped claims, or `iat` too far in the future
    pub fn verify(&self, token: &str, public_pem: &str) -> Result<Claims, AuthError> {
        let key = DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(|e| {
            tracing::error!(target: "shortener.auth.token", error = %e, "Resolved public key is unusable");
            AuthError::KeyResolution(KeyLookupError::InvalidKey(format!("parsing public pem: {e}")))
        })?;

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = true;
        // Expired means expired; only `iat` gets clock skew tolerance
        validation.leeway = 0;
        // No audience in this token format; issuer is compared by the session
        validation.validate_aud = false;

        let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            tracing::debug!(target: "shortener.auth.token", error = %e, "Token verification failed");
            AuthError::SignatureOrClaimsInvalid(e.to_string())
        })?;

        validate_iat(token_data.claims.iat, self.clock_skew).map_err(|e| {
            tracing::debug!(target: "shortener.auth.token", error = ?e, "Token iat validation failed");
            AuthError::SignatureOrClaimsInvalid(format!("{e:?}"))
        })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use shortener_test_utils::crypto_fixtures::{PRIMARY_PRIVATE_PEM, SECONDARY_PRIVATE_PEM};

    fn public_pem(private_pem: &str) -> String {
        rsa::RsaPrivateKey::from_pkcs1_pem(private_pem)
            .unwrap()
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap()
    }

    fn claims(iat_offset: i64, exp_offset: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: "1234".to_string(),
            iss: "URL-Shortener".to_string(),
            exp: now + exp_offset,
            iat: now + iat_offset,
            roles: ["ADMIN".to_string()].into_iter().collect(),
        }
    }

    fn sign(claims: &Claims) -> String {
        TokenCodec::default()
            .sign("primary", claims, &SecretString::from(PRIMARY_PRIVATE_PEM))
            .unwrap()
    }

    #[test]
    fn test_sign_embeds_kid_and_algorithm() {
        let token = sign(&claims(0, 3600));
        let unverified = TokenCodec::default().parse_unverified(&token).unwrap();

        assert_eq!(unverified.kid().unwrap(), "primary");
        assert_eq!(unverified.header()["alg"], "RS256");
        assert_eq!(unverified.claims()["iss"], "URL-Shortener");
    }

    #[test]
    fn test_verify_valid_token() {
        let original = claims(0, 3600);
        let token = sign(&original);

        let verified = TokenCodec::default()
            .verify(&token, &public_pem(PRIMARY_PRIVATE_PEM))
            .unwrap();

        assert_eq!(verified, original);
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let token = sign(&claims(0, 3600));

        let err = TokenCodec::default()
            .verify(&token, &public_pem(SECONDARY_PRIVATE_PEM))
            .unwrap_err();

        assert!(matches!(err, AuthError::SignatureOrClaimsInvalid(_)));
    }

    #[test]
    fn test_verify_expired_token_fails() {
        let token = sign(&claims(-7200, -3600));

        let err = TokenCodec::default()
            .verify(&token, &public_pem(PRIMARY_PRIVATE_PEM))
            .unwrap_err();

        assert!(matches!(err, AuthError::SignatureOrClaimsInvalid(_)));
    }

    #[test]
    fn test_verify_recently_expired_token_fails() {
        let token = sign(&claims(-120, -30));

        let err = TokenCodec::default()
            .verify(&token, &public_pem(PRIMARY_PRIVATE_PEM))
            .unwrap_err();

        assert!(matches!(err, AuthError::SignatureOrClaimsInvalid(_)));
    }

    #[test]
    fn test_verify_iat_too_far_in_future_fails() {
        let token = sign(&claims(3600, 7200));

        let err = TokenCodec::new(Duration::from_secs(300))
            .verify(&token, &public_pem(PRIMARY_PRIVATE_PEM))
            .unwrap_err();

        assert!(matches!(err, AuthError::SignatureOrClaimsInvalid(_)));
    }

    #[test]
    fn test_verify_rejects_hs256_token() {
        // HMAC token keyed with the public PEM bytes (classic alg confusion)
        let pem = public_pem(PRIMARY_PRIVATE_PEM);
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("primary".to_string());
        let token = encode(
            &header,
            &claims(0, 3600),
            &EncodingKey::from_secret(pem.as_bytes()),
        )
        .unwrap();

        let err = TokenCodec::default().verify(&token, &pem).unwrap_err();
        assert!(matches!(err, AuthError::SignatureOrClaimsInvalid(_)));
    }

    #[test]
    fn test_verify_unusable_public_key() {
        let token = sign(&claims(0, 3600));
        let err = TokenCodec::default().verify(&token, "garbage").unwrap_err();
        assert!(matches!(
            err,
            AuthError::KeyResolution(KeyLookupError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_sign_with_invalid_private_key() {
        let err = TokenCodec::default()
            .sign("kid", &claims(0, 60), &SecretString::from("not a key"))
            .unwrap_err();
        assert!(matches!(err, AuthError::Signing(_)));
    }

    #[test]
    fn test_parse_unverified_rejects_garbage() {
        let err = TokenCodec::default().parse_unverified("abc.def").unwrap_err();
        assert!(matches!(err, AuthError::TokenStructureInvalid(_)));
    }
}
