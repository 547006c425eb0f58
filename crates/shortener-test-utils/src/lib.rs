//! # URL Shortener Test Utilities
//!
//! This crate provides:
//! - Fixed RSA signing keys (`crypto_fixtures`)
//! - JWT builders for valid and deliberately broken tokens (`token_builders`)
//! - Key resolver and principal directory doubles (`resolvers`)
//! - Server test harness (`TestShortenerServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shortener_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestShortenerServer::spawn().await?;
//!     let token = TestTokenBuilder::new().with_roles(&["admin_only"]).sign();
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/v1/hackauth", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod resolvers;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use resolvers::*;
pub use server_harness::*;
pub use token_builders::*;
