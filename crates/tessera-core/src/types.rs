//! Policy tuples and the values that flow between the engine and its storage

use crate::errors::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Domain key used by relations declared without a domain field
///
/// Two-field relations store and query every edge under this single key so
/// reachability keeps one signature for both relation shapes.
pub const GLOBAL_DOMAIN: &str = "\u{0}global";

/// Outcome attached to a policy rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// The rule grants access
    Allow,
    /// The rule vetoes access
    Deny,
}

impl Effect {
    /// Lowercase name as written in policy tuples
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            other => Err(TesseraError::validation(format!(
                "effect must be `allow` or `deny`, got `{other}`"
            ))),
        }
    }
}

/// Ordered field values of one policy or grouping tuple
///
/// Equality is structural: two rules with the same values in the same order
/// are the same rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(Vec<String>);

impl Rule {
    /// Create a rule from owned values
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Borrow the values
    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Consume the rule, returning its values
    pub fn into_values(self) -> Vec<String> {
        self.0
    }
}

impl Deref for Rule {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: AsRef<str>> From<&[S]> for Rule {
    fn from(values: &[S]) -> Self {
        Self(values.iter().map(|v| v.as_ref().to_string()).collect())
    }
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for Rule {
    fn from(values: [S; N]) -> Self {
        Self(values.iter().map(|v| v.as_ref().to_string()).collect())
    }
}

impl From<Vec<String>> for Rule {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// A rule tagged with the policy or relation key it belongs to (`p`, `g2`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Policy type or relation name
    pub ptype: String,
    /// Field values
    pub rule: Rule,
}

impl Record {
    /// Create a record
    pub fn new(ptype: impl Into<String>, rule: impl Into<Rule>) -> Self {
        Self {
            ptype: ptype.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rule.is_empty() {
            f.write_str(&self.ptype)
        } else {
            write!(f, "{}, {}", self.ptype, self.rule)
        }
    }
}

/// Everything a storage backend holds, in storage order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Policy and grouping records
    pub records: Vec<Record>,
}

impl PolicySnapshot {
    /// Create a snapshot from records
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_effect_parsing_is_case_sensitive() {
        assert_eq!("allow".parse::<Effect>().unwrap(), Effect::Allow);
        assert_eq!("deny".parse::<Effect>().unwrap(), Effect::Deny);
        assert_matches!(
            "Allow".parse::<Effect>(),
            Err(TesseraError::Validation { .. })
        );
    }

    #[test]
    fn test_rule_equality_is_structural() {
        let a = Rule::from(["alice", "d1", "data", "read"]);
        let b = Rule::new(vec![
            "alice".into(),
            "d1".into(),
            "data".into(),
            "read".into(),
        ]);
        assert_eq!(a, b);
        assert_ne!(a, Rule::from(["d1", "alice", "data", "read"]));
    }

    #[test]
    fn test_record_display_matches_csv_line() {
        let record = Record::new("g", ["alice", "role:admin", "d1"]);
        assert_eq!(record.to_string(), "g, alice, role:admin, d1");
    }
}
