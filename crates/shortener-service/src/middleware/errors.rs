//! Error rendering.

use crate::web::{handler_fn, middleware_fn, respond, Handler, Middleware};
use std::sync::Arc;

/// Turn a failed request into a JSON error document.
///
/// Trusted errors render their own status, message and fields; every other
/// error renders a generic 500. The error is consumed unless it asks for
/// shutdown, in which case it is returned after the response is written.
/// A failure to write the response is returned instead.
pub fn errors() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |scope, req| {
            let next = Arc::clone(&next);
            async move {
                let Err(err) = next(Arc::clone(&scope), req).await else {
                    return Ok(());
                };

                tracing::error!(
                    target: "shortener.web.errors",
                    trace_id = %scope.trace_id(),
                    error = %err,
                    "request failed"
                );

                let (status, document) = err.outcome().render();
                respond(&scope, &document, status)?;

                if err.is_shutdown() {
                    return Err(err);
                }
                Ok(())
            }
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::errors::WebError;
    use crate::web::{wrap_middleware, RequestScope};
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::response::Response;
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;

    async fn run(handler: Handler) -> (Result<(), WebError>, Option<Response>) {
        let scope = Arc::new(RequestScope::new());
        let wrapped = wrap_middleware(handler, &[errors()]);
        let result = wrapped(Arc::clone(&scope), Request::new(Body::empty())).await;
        (result, scope.take_response())
    }

    async fn body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_success_is_untouched() {
        let (result, response) = run(handler_fn(|_scope, _req| async { Ok(()) })).await;

        assert!(result.is_ok());
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_trusted_error_renders_its_status_and_message() {
        let (result, response) = run(handler_fn(|_scope, _req| async {
            Err(WebError::trusted(StatusCode::IM_A_TEAPOT, "X"))
        }))
        .await;

        assert!(result.is_ok());
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body(response).await, r#"{"error":"X"}"#);
    }

    #[tokio::test]
    async fn test_trusted_fields_are_rendered() {
        let (_, response) = run(handler_fn(|_scope, _req| async {
            let fields = BTreeMap::from([("role".to_string(), "invalid role".to_string())]);
            Err(WebError::trusted_fields(
                StatusCode::BAD_REQUEST,
                "data validation error",
                fields,
            ))
        }))
        .await;

        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(response).await,
            r#"{"error":"data validation error","fields":{"role":"invalid role"}}"#
        );
    }

    #[tokio::test]
    async fn test_untrusted_error_text_never_reaches_the_client() {
        let (result, response) = run(handler_fn(|_scope, _req| async {
            Err(WebError::untrusted("password=hunter2 at db.internal"))
        }))
        .await;

        assert!(result.is_ok());
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await, r#"{"error":"Internal Server Error"}"#);
    }

    #[tokio::test]
    async fn test_shutdown_error_is_returned_after_response() {
        let (result, response) = run(handler_fn(|_scope, _req| async {
            Err(WebError::shutdown("integrity check failed"))
        }))
        .await;

        assert!(result.unwrap_err().is_shutdown());
        assert_eq!(response.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_write_failure_is_returned() {
        let (result, response) = run(handler_fn(|scope, _req| async move {
            respond(&scope, &serde_json::json!({"partial": true}), StatusCode::OK)?;
            Err(WebError::untrusted("failed after writing"))
        }))
        .await;

        assert!(matches!(result, Err(WebError::Untrusted(ref msg)) if msg.contains("already written")));
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }
}
