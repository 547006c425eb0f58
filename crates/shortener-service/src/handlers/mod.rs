//! HTTP request handlers for the URL Shortener.

pub mod debug;
pub mod hack;
pub mod health;
pub mod metrics;
pub mod roles;

pub use debug::vars;
pub use hack::{hack, hack_auth};
pub use health::{liveness, readiness};
pub use metrics::metrics_handler;
pub use roles::validate_role;
