//! Common utilities and types shared across URL Shortener components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (structural decoding, kid extraction, iat checks)
pub mod jwt;
