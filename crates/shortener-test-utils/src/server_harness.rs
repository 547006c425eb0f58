//! Test server harness for E2E testing
//!
//! Provides `TestShortenerServer` for spawning real service instances in tests.

use crate::crypto_fixtures::{fixture_key_store, TEST_ISSUER};
use metrics_exporter_prometheus::PrometheusBuilder;
use shortener_service::auth::{AllowAllPrincipals, AuthSession};
use shortener_service::config::Config;
use shortener_service::observability::Metrics;
use shortener_service::routes::{self, AppState};
use shortener_service::web::{shutdown_channel, ShutdownListener, ShutdownNotice};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the URL Shortener in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_liveness_e2e() -> anyhow::Result<()> {
///     let server = TestShortenerServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/v1/liveness", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestShortenerServer {
    addr: SocketAddr,
    config: Config,
    metrics: Arc<Metrics>,
    shutdown: ShutdownListener,
    _handle: JoinHandle<()>,
}

impl TestShortenerServer {
    /// Spawn a server trusting both fixture keys and every principal.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let session = AuthSession::new(
            TEST_ISSUER,
            Arc::new(fixture_key_store()),
            Arc::new(AllowAllPrincipals),
        );
        Self::spawn_with_session(session).await
    }

    /// Spawn a server around a caller-built session.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use a Prometheus recorder that is NOT installed globally
    /// - Start the HTTP server in the background
    pub async fn spawn_with_session(session: AuthSession) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("BUILD".to_string(), "test".to_string()),
            ("AUTH_ISSUER".to_string(), session.issuer().to_string()),
        ]);
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let metrics = Arc::new(Metrics::new());
        let (signal, shutdown) = shutdown_channel();

        let state = Arc::new(AppState {
            config: config.clone(),
            session: Arc::new(session),
            metrics: Arc::clone(&metrics),
            shutdown: signal,
        });

        // A recorder per server; only main installs one globally
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            // Use into_make_service_with_connect_info to support SocketAddr extraction
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            metrics,
            shutdown,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the metrics service the pipeline records into.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Pending shutdown notice raised by the pipeline, if any.
    pub fn take_shutdown_notice(&mut self) -> Option<ShutdownNotice> {
        self.shutdown.try_recv()
    }
}

impl Drop for TestShortenerServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}
