//! Standard request pipeline stages.
//!
//! # Components
//!
//! - `logger` - `request started` / `request completed` events
//! - `errors` - renders failures as JSON documents
//! - `metrics` - request, error and panic counters
//! - `panics` - turns a handler panic into `WebError::PanicRecovered`
//! - `auth` - route middleware: authenticate the bearer token, evaluate a rule

pub mod auth;
pub mod errors;
pub mod logger;
pub mod metrics;
pub mod panics;

pub use auth::{authenticate, authorize};
pub use errors::errors;
pub use logger::logger;
pub use metrics::metrics;
pub use panics::panics;

use crate::observability::Metrics;
use crate::web::Middleware;
use std::sync::Arc;

/// The application middleware every route gets, first element outermost.
pub fn standard(metrics_service: Arc<Metrics>) -> Vec<Middleware> {
    vec![logger(), errors(), metrics(metrics_service), panics()]
}
