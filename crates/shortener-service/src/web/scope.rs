//! Per-request values and the response writer.

use crate::errors::WebError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Values carried alongside one request from pipeline entry to response.
///
/// The status code is set exactly once, by the first response written.
pub struct RequestScope {
    trace_id: Uuid,
    received_at: DateTime<Utc>,
    started: Instant,
    status: OnceLock<StatusCode>,
    response: Mutex<Option<Response>>,
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("trace_id", &self.trace_id)
            .field("received_at", &self.received_at)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestScope {
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            received_at: Utc::now(),
            started: Instant::now(),
            status: OnceLock::new(),
            response: Mutex::new(None),
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Status of the written response, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status.get().copied()
    }

    pub fn is_written(&self) -> bool {
        self.status.get().is_some()
    }

    /// Store `response` as this request's response.
    ///
    /// # Errors
    ///
    /// `WebError::Untrusted` if a response was already written.
    pub fn write_response(&self, response: Response) -> Result<(), WebError> {
        self.status.set(response.status()).map_err(|_| {
            WebError::untrusted(format!(
                "response already written for trace {}",
                self.trace_id
            ))
        })?;

        *self.response.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
        Ok(())
    }

    /// Take the written response out of the scope.
    pub fn take_response(&self) -> Option<Response> {
        self.response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Write `data` as a JSON response with `status`.
///
/// `204 No Content` is written without a body.
///
/// # Errors
///
/// Fails if `data` cannot be serialized or a response was already written.
pub fn respond<T>(scope: &RequestScope, data: &T, status: StatusCode) -> Result<(), WebError>
where
    T: Serialize + ?Sized,
{
    if status == StatusCode::NO_CONTENT {
        return scope.write_response(status.into_response());
    }

    let body = serde_json::to_vec(data)
        .map_err(|e| WebError::untrusted(format!("serializing response: {e}")))?;

    scope.write_response(
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
    )
}
