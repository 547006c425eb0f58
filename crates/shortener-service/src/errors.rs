//! URL Shortener error types.
//!
//! Two layers:
//!
//! - [`AuthError`] and its building blocks ([`KeyLookupError`],
//!   [`PrincipalRejected`], [`RuleError`]) are returned by the auth subsystem
//!   and carry full internal detail for logging.
//! - [`WebError`] is what travels through the middleware pipeline. Only the
//!   `Trusted` variant ever reaches a client verbatim; everything else renders
//!   as a generic 500 document.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Client message for every bearer token failure.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Client message for a missing or malformed `Authorization` header.
pub const MALFORMED_HEADER_MESSAGE: &str = "expected authorization header format: Bearer <token>";

/// Client message for a request the principal is not allowed to make.
pub const FORBIDDEN_MESSAGE: &str = "attempted action is not allowed";

/// Body message for every untrusted failure.
pub const GENERIC_ERROR_MESSAGE: &str = "Internal Server Error";

// =============================================================================
// Auth errors
// =============================================================================

/// Failure to obtain key material from a [`crate::auth::KeyResolver`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyLookupError {
    #[error("no key registered for kid {0:?}")]
    UnknownKey(String),

    #[error("key source unavailable: {0}")]
    Unavailable(String),

    #[error("key resolution timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// Outcome of a failed principal enablement check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrincipalRejected {
    #[error("principal is disabled")]
    Disabled,

    #[error("principal is unknown")]
    Unknown,

    /// The directory backing the check could not answer.
    #[error("principal lookup failed: {0}")]
    Lookup(String),
}

/// Rule engine evaluation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Configuration defect: the caller named a rule that was never registered.
    #[error("authorization rule not found: {0}")]
    NotFound(String),

    #[error("attempted action is not allowed")]
    Forbidden,
}

/// Authentication and authorization failures, one per pipeline stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("expected authorization header format: Bearer <token>")]
    AuthHeaderMalformed,

    #[error("error parsing token: {0}")]
    TokenStructureInvalid(String),

    #[error("kid missing from header or malformed")]
    KeyIdMissingOrMalformed,

    #[error("failed to fetch public key: {0}")]
    KeyResolution(#[source] KeyLookupError),

    #[error("authentication failed: {0}")]
    SignatureOrClaimsInvalid(String),

    #[error("authentication failed: wrong issuer {actual:?}")]
    IssuerMismatch { actual: String },

    #[error("principal not enabled: {0}")]
    PrincipalDisabled(#[source] PrincipalRejected),

    #[error("authorization rule not found: {0}")]
    RuleNotFound(String),

    #[error("attempted action is not allowed")]
    Forbidden,

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<RuleError> for AuthError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::NotFound(name) => AuthError::RuleNotFound(name),
            RuleError::Forbidden => AuthError::Forbidden,
        }
    }
}

// =============================================================================
// Web errors
// =============================================================================

/// Error document written for every failed request.
///
/// `fields` is omitted entirely when there are no field-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

/// How a failed request is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Status and message are client-safe and rendered as-is.
    Trusted {
        status: StatusCode,
        message: String,
        fields: Option<BTreeMap<String, String>>,
    },

    /// Rendered as the fixed generic 500 document.
    Untrusted,
}

impl ResponseOutcome {
    /// Status code and document to write for this outcome.
    pub fn render(self) -> (StatusCode, ErrorDocument) {
        match self {
            ResponseOutcome::Trusted {
                status,
                message,
                fields,
            } => (
                status,
                ErrorDocument {
                    error: message,
                    fields,
                },
            ),
            ResponseOutcome::Untrusted => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDocument {
                    error: GENERIC_ERROR_MESSAGE.to_string(),
                    fields: None,
                },
            ),
        }
    }
}

/// Error type flowing through handlers and middleware.
#[derive(Debug, Error)]
pub enum WebError {
    /// Explicit status and client-safe message.
    #[error("{message}")]
    Trusted {
        status: StatusCode,
        message: String,
        fields: Option<BTreeMap<String, String>>,
    },

    /// Internal fault; the text is for logs only.
    #[error("{0}")]
    Untrusted(String),

    /// A handler panicked and the panic was contained.
    #[error("PANIC [{message}] TRACE[{trace}]")]
    PanicRecovered { message: String, trace: String },

    /// An integrity fault that should take the process down gracefully.
    #[error("web shutdown requested: {0}")]
    Shutdown(String),

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl WebError {
    /// A trusted error without field details.
    pub fn trusted(status: StatusCode, message: impl Into<String>) -> Self {
        WebError::Trusted {
            status,
            message: message.into(),
            fields: None,
        }
    }

    /// A trusted error carrying per-field validation messages.
    pub fn trusted_fields(
        status: StatusCode,
        message: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) -> Self {
        WebError::Trusted {
            status,
            message: message.into(),
            fields: Some(fields),
        }
    }

    pub fn untrusted(err: impl std::fmt::Display) -> Self {
        WebError::Untrusted(err.to_string())
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        WebError::Shutdown(reason.into())
    }

    /// Classify this error for rendering.
    pub fn outcome(&self) -> ResponseOutcome {
        match self {
            WebError::Trusted {
                status,
                message,
                fields,
            } => ResponseOutcome::Trusted {
                status: *status,
                message: message.clone(),
                fields: fields.clone(),
            },
            WebError::Untrusted(_)
            | WebError::PanicRecovered { .. }
            | WebError::Shutdown(_)
            | WebError::Io(_) => ResponseOutcome::Untrusted,
        }
    }

    /// Whether this error asks the process to shut down.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, WebError::Shutdown(_))
    }

    /// Whether this error is an ordinary client disconnect (broken pipe or
    /// connection reset) anywhere in its source chain.
    pub fn is_client_disconnect(&self) -> bool {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                if matches!(
                    io_err.kind(),
                    io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
                ) {
                    return true;
                }
                // io::Error::source skips the wrapped error itself
                if let Some(inner) = io_err.get_ref() {
                    current = Some(inner as &(dyn StdError + 'static));
                    continue;
                }
            }
            current = err.source();
        }
        false
    }
}

impl From<AuthError> for WebError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthHeaderMalformed => {
                WebError::trusted(StatusCode::UNAUTHORIZED, MALFORMED_HEADER_MESSAGE)
            }
            AuthError::TokenStructureInvalid(_)
            | AuthError::KeyIdMissingOrMalformed
            | AuthError::KeyResolution(KeyLookupError::UnknownKey(_))
            | AuthError::SignatureOrClaimsInvalid(_)
            | AuthError::IssuerMismatch { .. }
            | AuthError::PrincipalDisabled(PrincipalRejected::Disabled | PrincipalRejected::Unknown) => {
                WebError::trusted(StatusCode::UNAUTHORIZED, INVALID_TOKEN_MESSAGE)
            }
            AuthError::Forbidden => WebError::trusted(StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE),
            other @ (AuthError::KeyResolution(_)
            | AuthError::PrincipalDisabled(PrincipalRejected::Lookup(_))
            | AuthError::RuleNotFound(_)
            | AuthError::Signing(_)) => WebError::Untrusted(other.to_string()),
        }
    }
}
