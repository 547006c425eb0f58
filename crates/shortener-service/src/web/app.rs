//! Mounting handlers onto an axum [`Router`].

use crate::errors::GENERIC_ERROR_MESSAGE;
use crate::web::shutdown::ShutdownSignal;
use crate::web::{wrap_middleware, Handler, Middleware, RequestScope};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Router;
use std::sync::Arc;

/// Router builder that applies route and application middleware to every
/// handler it mounts.
pub struct App {
    router: Router,
    shutdown: ShutdownSignal,
    middleware: Vec<Middleware>,
}

impl App {
    /// `middleware` wraps every handler mounted with [`App::handle`], first
    /// element outermost.
    pub fn new(shutdown: ShutdownSignal, middleware: Vec<Middleware>) -> Self {
        Self {
            router: Router::new(),
            shutdown,
            middleware,
        }
    }

    /// Mount `handler` at `/{group}{path}`.
    ///
    /// Route middleware is applied first (innermost), then the application
    /// middleware around it.
    #[must_use]
    pub fn handle(
        self,
        method: MethodFilter,
        group: &str,
        path: &str,
        handler: Handler,
        route_middleware: &[Middleware],
    ) -> Self {
        let handler = wrap_middleware(handler, route_middleware);
        let handler = wrap_middleware(handler, &self.middleware);
        self.mount(method, group, path, handler)
    }

    /// Mount `handler` with no middleware at all.
    #[must_use]
    pub fn handle_no_middleware(
        self,
        method: MethodFilter,
        group: &str,
        path: &str,
        handler: Handler,
    ) -> Self {
        self.mount(method, group, path, handler)
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    fn mount(mut self, method: MethodFilter, group: &str, path: &str, handler: Handler) -> Self {
        let route = if group.is_empty() {
            path.to_string()
        } else {
            format!("/{group}{path}")
        };

        let shutdown = self.shutdown.clone();
        self.router = self.router.route(
            &route,
            on(method, move |req: Request| {
                let handler = Arc::clone(&handler);
                let shutdown = shutdown.clone();
                async move { serve(handler, shutdown, req).await }
            }),
        );

        tracing::debug!(target: "shortener.web", route = %route, "Route mounted");
        self
    }
}

/// Run one request through a composed handler and produce the HTTP response.
async fn serve(handler: Handler, shutdown: ShutdownSignal, req: Request) -> Response {
    let scope = Arc::new(RequestScope::new());
    let result = handler(Arc::clone(&scope), req).await;

    if let Err(err) = &result {
        tracing::error!(
            target: "shortener.web",
            trace_id = %scope.trace_id(),
            error = %err,
            "Error escaped the request pipeline"
        );
        shutdown.report(err);
    }

    match scope.take_response() {
        Some(response) => response,
        None if result.is_ok() => StatusCode::OK.into_response(),
        None => generic_error_response(),
    }
}

fn generic_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "error": GENERIC_ERROR_MESSAGE }).to_string(),
    )
        .into_response()
}
