//! Request counting.

use crate::errors::WebError;
use crate::observability::metrics::{Metrics, CONCURRENCY_SAMPLE_INTERVAL};
use crate::web::{handler_fn, middleware_fn, Handler, Middleware};
use std::sync::Arc;

/// Count every request, every failed request and every recovered panic.
///
/// Every [`CONCURRENCY_SAMPLE_INTERVAL`] requests the concurrency gauge is
/// refreshed from the in-flight count.
pub fn metrics(metrics: Arc<Metrics>) -> Middleware {
    middleware_fn(move |next: Handler| {
        let metrics = Arc::clone(&metrics);
        handler_fn(move |scope, req| {
            let next = Arc::clone(&next);
            let metrics = Arc::clone(&metrics);
            async move {
                let _in_flight = metrics.track_in_flight();

                let result = next(Arc::clone(&scope), req).await;

                if metrics
                    .add_request()
                    .is_multiple_of(CONCURRENCY_SAMPLE_INTERVAL)
                {
                    metrics.refresh_concurrency();
                }
                if let Err(err) = &result {
                    metrics.add_error();
                    if matches!(err, WebError::PanicRecovered { .. }) {
                        metrics.add_panic();
                    }
                }
                metrics.record_duration(scope.elapsed());

                result
            }
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::web::{wrap_middleware, RequestScope};
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;

    async fn call(handler: &Handler) -> Result<(), WebError> {
        handler(Arc::new(RequestScope::new()), Request::new(Body::empty())).await
    }

    #[tokio::test]
    async fn test_counts_requests_and_errors() {
        let service = Arc::new(Metrics::new());
        let ok = wrap_middleware(
            handler_fn(|_scope, _req| async { Ok(()) }),
            &[metrics(Arc::clone(&service))],
        );
        let trusted = wrap_middleware(
            handler_fn(|_scope, _req| async {
                Err(WebError::trusted(StatusCode::BAD_REQUEST, "bad input"))
            }),
            &[metrics(Arc::clone(&service))],
        );

        call(&ok).await.unwrap();
        call(&ok).await.unwrap();
        call(&trusted).await.unwrap_err();

        let snapshot = service.snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.panics, 0);
        assert_eq!(snapshot.in_flight, 0);
    }

    #[tokio::test]
    async fn test_counts_recovered_panics() {
        let service = Arc::new(Metrics::new());
        let handler = wrap_middleware(
            handler_fn(|_scope, _req| async {
                Err(WebError::PanicRecovered {
                    message: "boom".to_string(),
                    trace: String::new(),
                })
            }),
            &[metrics(Arc::clone(&service))],
        );

        call(&handler).await.unwrap_err();

        let snapshot = service.snapshot();
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.panics, 1);
    }

    #[tokio::test]
    async fn test_concurrency_sampled_every_interval() {
        let service = Arc::new(Metrics::new());
        let handler = wrap_middleware(
            handler_fn(|_scope, _req| async { Ok(()) }),
            &[metrics(Arc::clone(&service))],
        );

        for _ in 0..CONCURRENCY_SAMPLE_INTERVAL - 1 {
            call(&handler).await.unwrap();
        }
        // Nothing sampled yet; hold one request open to observe the sample.
        let _held = service.track_in_flight();
        assert_eq!(service.snapshot().concurrency, 0);

        call(&handler).await.unwrap();

        // The sampling request and the held one were both in flight.
        assert_eq!(service.snapshot().concurrency, 2);
    }
}
