//! Diagnostic routes for exercising the error and auth paths.

use crate::errors::WebError;
use crate::web::{handler_fn, respond, Handler};
use axum::http::StatusCode;
use rand::Rng;
use serde::Serialize;

/// Client message of the randomly returned trusted error.
pub const HACK_ERROR_MESSAGE: &str = "TRUSTED ERROR";

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Fails with a trusted 400 on roughly half of all calls.
pub fn hack() -> Handler {
    handler_fn(|scope, _req| async move {
        if rand::thread_rng().gen_range(0..100) % 2 == 0 {
            return Err(WebError::trusted(StatusCode::BAD_REQUEST, HACK_ERROR_MESSAGE));
        }
        respond(&scope, &StatusResponse { status: "ok" }, StatusCode::OK)
    })
}

/// Succeeds for any caller the route middleware let through.
pub fn hack_auth() -> Handler {
    handler_fn(|scope, _req| async move {
        respond(&scope, &StatusResponse { status: "ok" }, StatusCode::OK)
    })
}
