//! Request, policy and relation shapes declared by a model

use tessera_core::{Effect, Result, Rule, TesseraError};

/// Name of the policy field carrying the rule effect
pub const EFFECT_FIELD: &str = "eft";

/// Ordered request fields under one key (`r = sub, dom, obj, act`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSchema {
    key: String,
    fields: Vec<String>,
}

impl RequestSchema {
    /// Create a request schema
    pub fn new(key: impl Into<String>, fields: Vec<String>) -> Result<Self> {
        let key = key.into();
        check_fields(&key, &fields)?;
        Ok(Self { key, fields })
    }

    /// Section key (`r`, `r2`, ...)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Field names in order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields a request must supply
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Position of a named field
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Reject requests with the wrong number of values
    pub fn validate<S: AsRef<str>>(&self, request: &[S]) -> Result<()> {
        if request.len() != self.arity() {
            return Err(TesseraError::validation(format!(
                "request `{}` expects {} fields ({}), got {}",
                self.key,
                self.arity(),
                self.fields.join(", "),
                request.len()
            )));
        }
        Ok(())
    }
}

/// Ordered policy fields under one key, with an optional effect field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySchema {
    key: String,
    fields: Vec<String>,
    effect_index: Option<usize>,
}

impl PolicySchema {
    /// Create a policy schema; a field named `eft` becomes the effect field
    pub fn new(key: impl Into<String>, fields: Vec<String>) -> Result<Self> {
        let key = key.into();
        check_fields(&key, &fields)?;
        let effect_index = fields.iter().position(|f| f == EFFECT_FIELD);
        Ok(Self {
            key,
            fields,
            effect_index,
        })
    }

    /// Section key (`p`, `p2`, ...)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Field names in order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of values a rule must carry
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Position of a named field
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Position of the effect field, if the schema declares one
    pub fn effect_index(&self) -> Option<usize> {
        self.effect_index
    }

    /// Check arity and effect value of a rule before it is stored
    pub fn validate(&self, rule: &Rule) -> Result<()> {
        if rule.len() != self.arity() {
            return Err(TesseraError::validation(format!(
                "policy `{}` expects {} fields ({}), got {}",
                self.key,
                self.arity(),
                self.fields.join(", "),
                rule.len()
            )));
        }
        if let Some(idx) = self.effect_index {
            rule[idx].parse::<Effect>()?;
        }
        Ok(())
    }

    /// Effect of a stored rule; rules without an effect field allow
    pub fn effect_of(&self, rule: &[String]) -> Effect {
        match self.effect_index.and_then(|idx| rule.get(idx)) {
            Some(value) if value == Effect::Allow.as_str() => Effect::Allow,
            Some(_) => Effect::Deny,
            None => Effect::Allow,
        }
    }
}

/// A named grouping relation (`g = _, _, _`)
///
/// Edges run child to parent: `(alice, admin)` means alice inherits from, or
/// is contained in, admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    name: String,
    arity: usize,
}

impl RelationDefinition {
    /// Create a relation; arity must be 2 (child, parent) or 3 (with domain)
    pub fn new(name: impl Into<String>, arity: usize) -> Result<Self> {
        let name = name.into();
        if !(2..=3).contains(&arity) {
            return Err(TesseraError::configuration(format!(
                "relation `{name}` must have 2 or 3 fields, got {arity}"
            )));
        }
        Ok(Self { name, arity })
    }

    /// Relation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of fields in each grouping tuple
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Whether edges carry a domain
    pub fn has_domain(&self) -> bool {
        self.arity == 3
    }

    /// Check a grouping tuple has the declared shape
    pub fn validate(&self, rule: &Rule) -> Result<()> {
        if rule.len() != self.arity {
            return Err(TesseraError::validation(format!(
                "relation `{}` expects {} fields, got {}",
                self.name,
                self.arity,
                rule.len()
            )));
        }
        Ok(())
    }
}

fn check_fields(key: &str, fields: &[String]) -> Result<()> {
    if fields.is_empty() {
        return Err(TesseraError::configuration(format!(
            "`{key}` declares no fields"
        )));
    }
    for (i, field) in fields.iter().enumerate() {
        let valid = field
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(TesseraError::configuration(format!(
                "`{key}` has invalid field name `{field}`"
            )));
        }
        if fields[..i].contains(field) {
            return Err(TesseraError::configuration(format!(
                "`{key}` declares field `{field}` twice"
            )));
        }
    }
    Ok(())
}
