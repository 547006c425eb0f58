//! Token authentication and authorization.
//!
//! - `claims` - verified token claims and the role set
//! - `keystore` - key resolution capability and the RSA key store
//! - `key_cache` - public key cache over a resolver
//! - `rules` - authorization rule registry
//! - `token` - RS256 signing and verification
//! - `session` - the authenticate/authorize facade

pub mod claims;
pub mod key_cache;
pub mod keystore;
pub mod rules;
pub mod session;
pub mod token;

pub use claims::{Claims, Role, UnknownRole};
pub use key_cache::KeyCache;
pub use keystore::{KeyResolver, KeyStore, KeyStoreError};
pub use rules::{RuleEngine, RULE_ADMIN_ONLY};
pub use session::{AllowAllPrincipals, AuthSession, EnablementCheck};
pub use token::TokenCodec;
