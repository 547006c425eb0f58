//! JWT claims and the closed role set.
//!
//! The `sub` field is redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// JWT Claims structure for issued and validated tokens.
///
/// `roles` is a set: duplicates in the token collapse and order is irrelevant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    /// Issuer; must equal the configured issuer to be accepted.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    #[serde(default)]
    pub roles: BTreeSet<String>,
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("roles", &self.roles)
            .finish()
    }
}

impl Claims {
    /// Claims issued now and expiring after `ttl`.
    pub fn issued_now<I, R>(sub: impl Into<String>, iss: impl Into<String>, ttl: Duration, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let now = chrono::Utc::now().timestamp();
        // ttl is bounded by callers to at most a few years
        #[allow(clippy::cast_possible_wrap)]
        let ttl_secs = ttl.as_secs() as i64;

        Self {
            sub: sub.into(),
            iss: iss.into(),
            exp: now.saturating_add(ttl_secs),
            iat: now,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if the token carries exactly this role string.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

// =============================================================================
// Roles
// =============================================================================

/// Error returned when a string is not one of the known roles.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid role {0:?}")]
pub struct UnknownRole(pub String);

/// The closed set of roles a principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::User];

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    /// Parse a role name. Matching is exact and case-sensitive.
    pub fn parse(value: &str) -> Result<Self, UnknownRole> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| UnknownRole(value.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s)
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}
