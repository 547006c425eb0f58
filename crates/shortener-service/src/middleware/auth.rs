//! Route middleware for protected endpoints.
//!
//! `authenticate` must run before `authorize` on the same route: it stores
//! the verified [`Claims`] in the request extensions for `authorize` and the
//! handler to read.

use crate::auth::{AuthSession, Claims};
use crate::errors::WebError;
use crate::web::{handler_fn, middleware_fn, Handler, Middleware};
use axum::http::{header, StatusCode};
use std::sync::Arc;

/// Client message when `authorize` runs without claims in the request.
pub const NO_CLAIMS_MESSAGE: &str = "you are not authorized for that action, no claims";

/// Verify the `Authorization: Bearer <token>` header.
///
/// A missing header is treated like a malformed one.
pub fn authenticate(session: Arc<AuthSession>) -> Middleware {
    middleware_fn(move |next: Handler| {
        let session = Arc::clone(&session);
        handler_fn(move |scope, mut req| {
            let next = Arc::clone(&next);
            let session = Arc::clone(&session);
            async move {
                let bearer = req
                    .headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                let claims = session.authenticate(&bearer).await?;
                req.extensions_mut().insert(claims);

                next(scope, req).await
            }
        })
    })
}

/// Evaluate `rule` against the claims stored by [`authenticate`].
pub fn authorize(session: Arc<AuthSession>, rule: &'static str) -> Middleware {
    middleware_fn(move |next: Handler| {
        let session = Arc::clone(&session);
        handler_fn(move |scope, req| {
            let next = Arc::clone(&next);
            let session = Arc::clone(&session);
            async move {
                let Some(claims) = req.extensions().get::<Claims>() else {
                    return Err(WebError::trusted(StatusCode::UNAUTHORIZED, NO_CLAIMS_MESSAGE));
                };
                session.authorize(claims, Some(&claims.sub), rule)?;

                next(scope, req).await
            }
        })
    })
}
