//! Request start/completion events.

use crate::web::{handler_fn, middleware_fn, Handler, Middleware};
use axum::extract::ConnectInfo;
use std::net::SocketAddr;
use std::sync::Arc;

/// Log `request started` before the inner handler runs and
/// `request completed` after it returns, whatever the outcome.
pub fn logger() -> Middleware {
    middleware_fn(|next: Handler| {
        handler_fn(move |scope, req| {
            let next = Arc::clone(&next);
            async move {
                let method = req.method().clone();
                let path = req
                    .uri()
                    .path_and_query()
                    .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
                let remote_addr = req
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map_or_else(|| "unknown".to_string(), |info| info.0.to_string());

                tracing::info!(
                    target: "shortener.web",
                    trace_id = %scope.trace_id(),
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    "request started"
                );

                let result = next(Arc::clone(&scope), req).await;

                let elapsed_ms = u64::try_from(scope.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::info!(
                    target: "shortener.web",
                    trace_id = %scope.trace_id(),
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    status = scope.status().map(|s| s.as_u16()),
                    elapsed_ms,
                    "request completed"
                );

                result
            }
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::errors::WebError;
    use crate::middleware::errors;
    use crate::web::{respond, wrap_middleware, RequestScope};
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use std::io;
    use std::sync::Mutex;
    use tracing::subscriber::DefaultGuard;

    /// Formatted log output shared with the test subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn line(&self, message: &str) -> String {
            let output = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            output
                .lines()
                .find(|line| line.contains(message))
                .unwrap_or_else(|| panic!("no {message:?} event in:\n{output}"))
                .to_string()
        }

        fn position(&self, message: &str) -> usize {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .find(message)
                .unwrap()
        }
    }

    // The subscriber stays installed for the current thread while the guard
    // lives; #[tokio::test] polls the test future on that same thread.
    fn capture_logs() -> (CapturedLogs, DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn request_from_peer() -> Request {
        let mut req = Request::builder()
            .method("POST")
            .uri("/v1/hack?x=1")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        req
    }

    fn assert_request_fields(line: &str) {
        assert!(line.contains("method=POST"), "{line}");
        assert!(line.contains("path=/v1/hack?x=1"), "{line}");
        assert!(line.contains("remote_addr=127.0.0.1:4000"), "{line}");
        assert!(line.contains("trace_id="), "{line}");
    }

    #[tokio::test]
    async fn test_logs_start_and_completion_with_written_status() {
        let (logs, _guard) = capture_logs();
        let handler = wrap_middleware(
            handler_fn(|scope, _req| async move {
                respond(&scope, &serde_json::json!({"status": "ok"}), StatusCode::CREATED)
            }),
            &[logger()],
        );

        handler(Arc::new(RequestScope::new()), request_from_peer())
            .await
            .unwrap();

        let started = logs.line("request started");
        let completed = logs.line("request completed");
        assert_request_fields(&started);
        assert_request_fields(&completed);
        assert!(!started.contains("status="), "{started}");
        assert!(completed.contains("status=201"), "{completed}");
        assert!(completed.contains("elapsed_ms="), "{completed}");
        assert!(logs.position("request started") < logs.position("request completed"));
    }

    #[tokio::test]
    async fn test_logs_completion_for_failed_request() {
        let (logs, _guard) = capture_logs();
        let handler = wrap_middleware(
            handler_fn(|_scope, _req| async { Err(WebError::untrusted("inner")) }),
            &[logger(), errors()],
        );

        handler(Arc::new(RequestScope::new()), request_from_peer())
            .await
            .unwrap();

        let completed = logs.line("request completed");
        assert_request_fields(&logs.line("request started"));
        assert_request_fields(&completed);
        assert!(completed.contains("status=500"), "{completed}");
    }

    #[tokio::test]
    async fn test_passes_error_through_and_still_logs_completion() {
        let (logs, _guard) = capture_logs();
        let handler = wrap_middleware(
            handler_fn(|_scope, _req| async { Err(WebError::untrusted("inner")) }),
            &[logger()],
        );

        let err = handler(Arc::new(RequestScope::new()), request_from_peer())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "inner");
        let completed = logs.line("request completed");
        assert_request_fields(&completed);
        assert!(!completed.contains("status="), "{completed}");
    }

    #[tokio::test]
    async fn test_missing_connect_info() {
        let (logs, _guard) = capture_logs();
        let handler = wrap_middleware(handler_fn(|_scope, _req| async { Ok(()) }), &[logger()]);

        handler(Arc::new(RequestScope::new()), Request::new(Body::empty()))
            .await
            .unwrap();

        assert!(logs.line("request started").contains("remote_addr=unknown"));
    }
}
