//! URL Shortener service library.
//!
//! Bearer token authentication and authorization plus the request pipeline
//! every route runs through:
//!
//! - `auth` - token codec, key cache, rule engine, auth session
//! - `web` - handler/middleware types, request scope, route mounting, shutdown
//! - `middleware` - logger, errors, metrics, panics and auth stages
//! - `observability` - metrics service, Prometheus recorder, tracing setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod web;
