//! Enforcement results with their supporting rules

use serde::Serialize;
use tessera_core::{Effect, Rule};

/// A rule that matched the request, with its effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedRule {
    /// Stored rule values
    pub rule: Rule,
    /// Effect the rule contributed
    pub effect: Effect,
}

/// Outcome of one enforcement call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Final allow/deny
    pub allowed: bool,
    /// Matched rules in store order; empty unless explanation was requested
    pub matched: Vec<MatchedRule>,
}

impl Decision {
    /// Rules that matched with a deny effect
    pub fn denials(&self) -> impl Iterator<Item = &MatchedRule> {
        self.matched.iter().filter(|m| m.effect == Effect::Deny)
    }
}
