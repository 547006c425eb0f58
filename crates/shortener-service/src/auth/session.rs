//! Authentication and authorization facade.
//!
//! [`AuthSession::authenticate`] walks a fixed sequence of stages, each one
//! terminal on failure:
//!
//! 1. split the `Bearer` header
//! 2. decode the token structure without verification
//! 3. extract the `kid` header
//! 4. resolve the public key through the [`KeyCache`]
//! 5. verify signature and claims
//! 6. compare the issuer
//! 7. run the enablement check
//!
//! [`AuthSession::authorize`] evaluates a named rule from the [`RuleEngine`].

use crate::auth::claims::Claims;
use crate::auth::key_cache::{KeyCache, DEFAULT_RESOLVE_TIMEOUT};
use crate::auth::keystore::KeyResolver;
use crate::auth::rules::RuleEngine;
use crate::auth::token::TokenCodec;
use crate::errors::{AuthError, KeyLookupError, PrincipalRejected};
use async_trait::async_trait;
use common::jwt::DEFAULT_CLOCK_SKEW;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Decides whether a verified principal may still act.
#[async_trait]
pub trait EnablementCheck: Send + Sync {
    async fn check(&self, claims: &Claims) -> Result<(), PrincipalRejected>;
}

/// Enablement check that accepts every principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPrincipals;

#[async_trait]
impl EnablementCheck for AllowAllPrincipals {
    async fn check(&self, _claims: &Claims) -> Result<(), PrincipalRejected> {
        Ok(())
    }
}

/// Token issuance, authentication and authorization.
pub struct AuthSession {
    issuer: String,
    codec: TokenCodec,
    resolver: Arc<dyn KeyResolver>,
    keys: KeyCache,
    rules: RuleEngine,
    enablement: Arc<dyn EnablementCheck>,
}

impl AuthSession {
    /// Create a session with the standard rule set, the default clock skew
    /// and the default key resolution deadline.
    pub fn new(
        issuer: impl Into<String>,
        resolver: Arc<dyn KeyResolver>,
        enablement: Arc<dyn EnablementCheck>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            codec: TokenCodec::new(DEFAULT_CLOCK_SKEW),
            keys: KeyCache::new(Arc::clone(&resolver), DEFAULT_RESOLVE_TIMEOUT),
            resolver,
            rules: RuleEngine::standard(),
            enablement,
        }
    }

    #[must_use]
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.codec = TokenCodec::new(clock_skew);
        self
    }

    /// Replace the key cache with an empty one using `timeout` per resolution.
    #[must_use]
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.keys = KeyCache::new(Arc::clone(&self.resolver), timeout);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.keys
    }

    /// Sign `claims` with the private key registered under `kid`.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyResolution` - the resolver failed or timed out
    /// - `AuthError::Signing` - the key is unusable or signing failed
    #[instrument(skip(self, claims), fields(kid = %kid))]
    pub async fn issue(&self, kid: &str, claims: &Claims) -> Result<String, AuthError> {
        let timeout = self.keys.resolve_timeout();
        let private_pem = match tokio::time::timeout(timeout, self.resolver.private_key(kid)).await {
            Ok(Ok(pem)) => pem,
            Ok(Err(e)) => return Err(AuthError::KeyResolution(e)),
            Err(_) => return Err(AuthError::KeyResolution(KeyLookupError::Timeout(timeout))),
        };

        let token = self.codec.sign(kid, claims, &private_pem)?;

        tracing::debug!(target: "shortener.auth.session", kid = %kid, "Token issued");
        Ok(token)
    }

    /// Authenticate an `Authorization` header value and return the verified claims.
    ///
    /// # Errors
    ///
    /// One [`AuthError`] variant per failed stage; see the module docs.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, bearer: &str) -> Result<Claims, AuthError> {
        // 1. Split the scheme from the token
        let token = parse_bearer(bearer)?;

        // 2. Decode without verification to read the header
        let unverified = self.codec.parse_unverified(token)?;

        // 3. The header must carry a string kid
        let kid = unverified.kid().map_err(|e| {
            tracing::debug!(target: "shortener.auth.session", error = ?e, "Token kid extraction failed");
            AuthError::KeyIdMissingOrMalformed
        })?;

        // 4. Resolve the public key (cold misses go to the resolver)
        let public_pem = self
            .keys
            .lookup(kid)
            .await
            .map_err(AuthError::KeyResolution)?;

        // 5. Full cryptographic verification
        let claims = self.codec.verify(token, &public_pem)?;

        // 6. Issuer must match exactly
        if claims.iss != self.issuer {
            tracing::debug!(
                target: "shortener.auth.session",
                expected = %self.issuer,
                actual = %claims.iss,
                "Token issuer mismatch"
            );
            return Err(AuthError::IssuerMismatch {
                actual: claims.iss,
            });
        }

        // 7. Principal must still be enabled
        self.enablement.check(&claims).await.map_err(|e| {
            tracing::debug!(target: "shortener.auth.session", error = %e, "Principal rejected");
            AuthError::PrincipalDisabled(e)
        })?;

        tracing::debug!(target: "shortener.auth.session", kid = %kid, "Token authenticated");
        Ok(claims)
    }

    /// Evaluate rule `rule` against `claims`.
    ///
    /// `subject_id` identifies the owner of the target resource for rules that
    /// compare it against `claims.sub`; the standard rules ignore it.
    ///
    /// # Errors
    ///
    /// - `AuthError::RuleNotFound` - `rule` is not registered
    /// - `AuthError::Forbidden` - the rule rejected the claims
    pub fn authorize(
        &self,
        claims: &Claims,
        subject_id: Option<&str>,
        rule: &str,
    ) -> Result<(), AuthError> {
        self.rules.evaluate(rule, claims).map_err(|e| {
            tracing::debug!(
                target: "shortener.auth.session",
                rule = %rule,
                has_subject = subject_id.is_some(),
                error = %e,
                "Authorization denied"
            );
            AuthError::from(e)
        })
    }
}

/// Split `Bearer <token>`. Exactly one space and a non-empty token.
fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => {
            tracing::debug!(target: "shortener.auth.session", "Invalid Authorization header format");
            Err(AuthError::AuthHeaderMalformed)
        }
    }
}
