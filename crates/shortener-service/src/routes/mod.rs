//! HTTP routes for the URL Shortener.
//!
//! Defines the Axum router and application state.

use crate::auth::{AuthSession, RULE_ADMIN_ONLY};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{self, authenticate, authorize};
use crate::observability::Metrics;
use crate::web::{App, ShutdownSignal};
use axum::routing::{get, MethodFilter};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;

/// Route group for versioned endpoints.
pub const VERSION: &str = "v1";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token verification and authorization.
    pub session: Arc<AuthSession>,

    /// Request counters fed by the metrics middleware.
    pub metrics: Arc<Metrics>,

    /// Raised by the pipeline when the service must stop.
    pub shutdown: ShutdownSignal,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/liveness`, `/v1/readiness` - probes, no middleware
/// - `/v1/hack` - random trusted error, standard middleware
/// - `/v1/hackauth` - requires a token passing `admin_only`
/// - `/v1/roles/:role` - role name validation
/// - `/debug/vars` - counters as JSON
/// - `/metrics` - Prometheus metrics endpoint
/// - request timeout from `REQUEST_TIMEOUT_SECONDS`
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let session = &state.session;

    let app = App::new(
        state.shutdown.clone(),
        middleware::standard(Arc::clone(&state.metrics)),
    )
    .handle_no_middleware(
        MethodFilter::GET,
        VERSION,
        "/readiness",
        handlers::readiness(),
    )
    .handle_no_middleware(
        MethodFilter::GET,
        VERSION,
        "/liveness",
        handlers::liveness(state.config.build.clone()),
    )
    .handle(MethodFilter::GET, VERSION, "/hack", handlers::hack(), &[])
    .handle(
        MethodFilter::GET,
        VERSION,
        "/hackauth",
        handlers::hack_auth(),
        &[
            authenticate(Arc::clone(session)),
            authorize(Arc::clone(session), RULE_ADMIN_ONLY),
        ],
    )
    .handle(
        MethodFilter::GET,
        VERSION,
        "/roles/:role",
        handlers::validate_role(),
        &[],
    );

    // Operational routes with their own state
    let debug_routes = Router::new()
        .route("/debug/vars", get(handlers::vars))
        .with_state(Arc::clone(&state.metrics));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    app.into_router()
        .merge(debug_routes)
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout))
}
