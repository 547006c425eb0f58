//! Builder patterns for test tokens.
//!
//! Tokens are signed with `jsonwebtoken` directly rather than through
//! `AuthSession::issue`, so tests can produce tokens the service itself would
//! never issue (wrong issuer, no `kid`, expired, issued in the future).

use crate::crypto_fixtures::{PRIMARY_KID, PRIMARY_PRIVATE_PEM, TEST_ISSUER};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

/// Builder for signed test JWTs.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("alice")
///     .with_roles(&["admin_only"])
///     .expires_in(3600)
///     .sign();
/// ```
pub struct TestTokenBuilder {
    kid: Option<String>,
    private_pem: String,
    sub: String,
    iss: String,
    roles: Vec<String>,
    exp: i64,
    iat: i64,
}

impl TestTokenBuilder {
    /// A valid token for the primary fixture key, one hour lifetime, no roles.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            kid: Some(PRIMARY_KID.to_string()),
            private_pem: PRIMARY_PRIVATE_PEM.to_string(),
            sub: "test-subject".to_string(),
            iss: TEST_ISSUER.to_string(),
            roles: Vec::new(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Set the subject
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the issuer
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set the role strings
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| (*r).to_string()).collect();
        self
    }

    /// Set the header `kid`
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Omit the header `kid`
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Sign with a different PKCS#1 private key (the header `kid` is unchanged)
    pub fn signed_with(mut self, private_pem: &str) -> Self {
        self.private_pem = private_pem.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at in seconds from now (positive for a future `iat`)
    pub fn issued_in(mut self, seconds: i64) -> Self {
        self.iat = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// The claims as a JSON value
    pub fn claims(&self) -> Value {
        json!({
            "sub": self.sub,
            "iss": self.iss,
            "exp": self.exp,
            "iat": self.iat,
            "roles": self.roles,
        })
    }

    /// Sign the token with RS256.
    ///
    /// # Panics
    ///
    /// Panics if the private key does not parse.
    pub fn sign(self) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid.clone();

        let key = EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
            .expect("fixture private key should parse");
        encode(&header, &self.claims(), &key).expect("signing should succeed")
    }

    /// `Bearer <token>` for the signed token.
    pub fn bearer(self) -> String {
        format!("Bearer {}", self.sign())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
