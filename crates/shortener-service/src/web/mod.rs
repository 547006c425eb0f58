//! Handler and middleware plumbing mounted onto axum.
//!
//! A [`Handler`] takes the per-request [`RequestScope`] and the request, writes
//! its response into the scope via [`respond`], and returns `Ok(())` or a
//! [`WebError`]. A [`Middleware`] turns one handler into another.
//!
//! Middleware lists are applied so that the FIRST element is the OUTERMOST
//! wrapper: `[a, b, c]` around `h` runs `a(b(c(h)))`.

pub mod app;
pub mod scope;
pub mod shutdown;

pub use app::App;
pub use scope::{respond, RequestScope};
pub use shutdown::{shutdown_channel, ShutdownListener, ShutdownNotice, ShutdownSignal};

use crate::errors::WebError;
use axum::extract::Request;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Result of running a handler.
pub type HandlerResult = Result<(), WebError>;

/// Type-erased request handler.
pub type Handler =
    Arc<dyn Fn(Arc<RequestScope>, Request) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Handler transform.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Box an async function into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<RequestScope>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |scope, req| Box::pin(f(scope, req)))
}

/// Box a handler transform into a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap `handler` in `middleware`, first element outermost.
pub fn wrap_middleware(handler: Handler, middleware: &[Middleware]) -> Handler {
    middleware
        .iter()
        .rev()
        .fold(handler, |inner, wrap| wrap(inner))
}
