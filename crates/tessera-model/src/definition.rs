//! Model definition
//!
//! Parses the INI-style model text into schemas, relations, effect combinators
//! and compiled matchers. All cross-references are checked here, so a model
//! that builds never fails for configuration reasons later.

use crate::effect::{parse_effect_expression, EffectCombinator};
use crate::matcher::{Matcher, Scope};
use crate::schema::{PolicySchema, RelationDefinition, RequestSchema};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tessera_core::{Result, TesseraError};

/// Model sections in the order they are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Request,
    Policy,
    Role,
    Effect,
    Matchers,
}

impl Section {
    fn from_header(name: &str) -> Option<Self> {
        match name {
            "request_definition" => Some(Self::Request),
            "policy_definition" => Some(Self::Policy),
            "role_definition" => Some(Self::Role),
            "policy_effect" => Some(Self::Effect),
            "matchers" => Some(Self::Matchers),
            _ => None,
        }
    }

    fn header(self) -> &'static str {
        match self {
            Self::Request => "request_definition",
            Self::Policy => "policy_definition",
            Self::Role => "role_definition",
            Self::Effect => "policy_effect",
            Self::Matchers => "matchers",
        }
    }
}

type Entries = IndexMap<String, String>;

/// Keys selecting which request, policy, effect and matcher an enforcement uses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnforceContext {
    /// Request key (`r`)
    pub request: String,
    /// Policy key (`p`)
    pub policy: String,
    /// Effect key (`e`)
    pub effect: String,
    /// Matcher key (`m`)
    pub matcher: String,
}

impl EnforceContext {
    /// Context using the numbered keys `r{n}`, `p{n}`, `e{n}`, `m{n}`
    ///
    /// `suffix(2)` selects `r2`/`p2`/`e2`/`m2`.
    pub fn suffix(n: usize) -> Self {
        Self {
            request: format!("r{n}"),
            policy: format!("p{n}"),
            effect: format!("e{n}"),
            matcher: format!("m{n}"),
        }
    }
}

impl Default for EnforceContext {
    fn default() -> Self {
        Self {
            request: "r".into(),
            policy: "p".into(),
            effect: "e".into(),
            matcher: "m".into(),
        }
    }
}

/// Resolved pieces of an [`EnforceContext`]
#[derive(Debug, Clone, Copy)]
pub struct ResolvedContext<'a> {
    /// Request schema
    pub request: &'a RequestSchema,
    /// Policy schema
    pub policy: &'a PolicySchema,
    /// Effect combinator
    pub effect: &'a dyn EffectCombinator,
    /// Compiled matcher
    pub matcher: &'a Matcher,
}

/// A parsed and cross-checked access-control model
#[derive(Clone)]
pub struct Model {
    requests: IndexMap<String, RequestSchema>,
    policies: IndexMap<String, PolicySchema>,
    relations: IndexMap<String, RelationDefinition>,
    effects: IndexMap<String, Arc<dyn EffectCombinator>>,
    effect_policies: IndexMap<String, String>,
    matchers: IndexMap<String, Matcher>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("requests", &self.requests.keys().collect::<Vec<_>>())
            .field("policies", &self.policies.keys().collect::<Vec<_>>())
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field(
                "effects",
                &self
                    .effects
                    .iter()
                    .map(|(k, e)| (k, e.name()))
                    .collect::<Vec<_>>(),
            )
            .field("matchers", &self.matchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FromStr for Model {
    type Err = TesseraError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_text(text)
    }
}

impl Model {
    /// Parse model text
    pub fn from_text(text: &str) -> Result<Self> {
        let mut sections = split_sections(text)?;
        for required in [
            Section::Request,
            Section::Policy,
            Section::Effect,
            Section::Matchers,
        ] {
            if sections.get(&required).map_or(true, IndexMap::is_empty) {
                return Err(TesseraError::configuration(format!(
                    "model is missing section [{}]",
                    required.header()
                )));
            }
        }

        let mut requests = IndexMap::new();
        for (key, value) in sections.shift_remove(&Section::Request).unwrap_or_default() {
            let schema = RequestSchema::new(key.clone(), split_fields(&value))?;
            requests.insert(key, schema);
        }

        let mut policies = IndexMap::new();
        for (key, value) in sections.shift_remove(&Section::Policy).unwrap_or_default() {
            if requests.contains_key(&key) {
                return Err(TesseraError::configuration(format!(
                    "`{key}` is declared as both a request and a policy"
                )));
            }
            let schema = PolicySchema::new(key.clone(), split_fields(&value))?;
            policies.insert(key, schema);
        }

        let mut relations = IndexMap::new();
        for (name, value) in sections.shift_remove(&Section::Role).unwrap_or_default() {
            if requests.contains_key(&name) || policies.contains_key(&name) {
                return Err(TesseraError::configuration(format!(
                    "relation `{name}` collides with a request or policy key"
                )));
            }
            let parts = split_fields(&value);
            if let Some(bad) = parts.iter().find(|p| p.as_str() != "_") {
                return Err(TesseraError::configuration(format!(
                    "relation `{name}` fields must be `_`, found `{bad}`"
                )));
            }
            let def = RelationDefinition::new(name.clone(), parts.len())?;
            relations.insert(name, def);
        }

        let mut effects = IndexMap::new();
        let mut effect_policies = IndexMap::new();
        for (key, value) in sections.shift_remove(&Section::Effect).unwrap_or_default() {
            let (policy, combinator) =
                parse_effect_expression(&value, policies.keys().map(String::as_str))?;
            effect_policies.insert(key.clone(), policy.to_string());
            effects.insert(key, combinator);
        }

        let scope = Scope {
            requests: &requests,
            policies: &policies,
            relations: &relations,
        };
        let mut matchers = IndexMap::new();
        for (key, value) in sections.shift_remove(&Section::Matchers).unwrap_or_default() {
            let matcher = Matcher::compile(key.clone(), &value, scope)
                .map_err(|e| TesseraError::configuration(format!("matcher `{key}`: {e}")))?;
            matchers.insert(key, matcher);
        }

        let model = Self {
            requests,
            policies,
            relations,
            effects,
            effect_policies,
            matchers,
        };
        tracing::debug!(model = ?model, "Parsed model");
        Ok(model)
    }

    /// Read and parse a model file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::configuration(format!(
                "Failed to read model file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_text(&text)
    }

    /// Replace the combinator under an effect key
    ///
    /// A key parsed from the model text stays bound to the policy its
    /// expression named.
    pub fn with_combinator(mut self, key: impl Into<String>, combinator: Arc<dyn EffectCombinator>) -> Self {
        self.effects.insert(key.into(), combinator);
        self
    }

    /// Request schema by key
    pub fn request(&self, key: &str) -> Option<&RequestSchema> {
        self.requests.get(key)
    }

    /// Policy schema by key
    pub fn policy(&self, key: &str) -> Option<&PolicySchema> {
        self.policies.get(key)
    }

    /// All policy schemas in declaration order
    pub fn policies(&self) -> impl Iterator<Item = &PolicySchema> {
        self.policies.values()
    }

    /// Relation by name
    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.get(name)
    }

    /// Relation index and definition by name
    pub fn relation_full(&self, name: &str) -> Option<(usize, &RelationDefinition)> {
        self.relations.get_full(name).map(|(idx, _, def)| (idx, def))
    }

    /// All relations in declaration order; positions match `Expr::Membership`
    pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.relations.values()
    }

    /// Effect combinator by key
    pub fn effect(&self, key: &str) -> Option<&dyn EffectCombinator> {
        self.effects.get(key).map(|e| e.as_ref())
    }

    /// Compiled matcher by key
    pub fn matcher(&self, key: &str) -> Option<&Matcher> {
        self.matchers.get(key)
    }

    /// Look up every piece of an enforcement context
    ///
    /// Fails with a validation error when a key is not declared, when the
    /// matcher reads from a different request or policy than the context
    /// names, or when the effect expression reads from a different policy.
    pub fn resolve(&self, ctx: &EnforceContext) -> Result<ResolvedContext<'_>> {
        let missing = |what: &str, key: &str| {
            TesseraError::validation(format!("model declares no {what} `{key}`"))
        };
        let request = self
            .request(&ctx.request)
            .ok_or_else(|| missing("request", &ctx.request))?;
        let policy = self
            .policy(&ctx.policy)
            .ok_or_else(|| missing("policy", &ctx.policy))?;
        let effect = self
            .effect(&ctx.effect)
            .ok_or_else(|| missing("effect", &ctx.effect))?;
        let matcher = self
            .matcher(&ctx.matcher)
            .ok_or_else(|| missing("matcher", &ctx.matcher))?;

        if matcher.request_key().is_some_and(|k| k != ctx.request)
            || matcher.policy_key().is_some_and(|k| k != ctx.policy)
        {
            return Err(TesseraError::validation(format!(
                "matcher `{}` does not read from request `{}` and policy `{}`",
                ctx.matcher, ctx.request, ctx.policy
            )));
        }
        if let Some(bound) = self.effect_policies.get(&ctx.effect) {
            if *bound != ctx.policy {
                return Err(TesseraError::validation(format!(
                    "effect `{}` reads policy `{bound}`, not `{}`",
                    ctx.effect, ctx.policy
                )));
            }
        }

        Ok(ResolvedContext {
            request,
            policy,
            effect,
            matcher,
        })
    }
}

fn split_fields(value: &str) -> Vec<String> {
    value.split(',').map(|f| f.trim().to_string()).collect()
}

fn split_sections(text: &str) -> Result<IndexMap<Section, Entries>> {
    let mut sections: IndexMap<Section, Entries> = IndexMap::new();
    let mut current: Option<Section> = None;
    let mut pending = String::new();
    let mut pending_line = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#')) {
            continue;
        }

        if let Some(cont) = line.strip_suffix('\\') {
            if pending.is_empty() {
                pending_line = line_no;
            }
            pending.push_str(cont.trim_end());
            pending.push(' ');
            continue;
        }
        let (line, line_no) = if pending.is_empty() {
            (line.to_string(), line_no)
        } else {
            pending.push_str(line);
            (std::mem::take(&mut pending), pending_line)
        };

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let section = Section::from_header(header.trim()).ok_or_else(|| {
                TesseraError::configuration(format!(
                    "line {line_no}: unknown section [{}]",
                    header.trim()
                ))
            })?;
            if sections.contains_key(&section) {
                return Err(TesseraError::configuration(format!(
                    "line {line_no}: section [{}] appears twice",
                    section.header()
                )));
            }
            sections.insert(section, Entries::new());
            current = Some(section);
            continue;
        }

        let Some(section) = current else {
            return Err(TesseraError::configuration(format!(
                "line {line_no}: entry outside of any section"
            )));
        };
        let Some((key, value)) = line.split_once('=') else {
            return Err(TesseraError::configuration(format!(
                "line {line_no}: expected `key = value`"
            )));
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Err(TesseraError::configuration(format!(
                "line {line_no}: expected `key = value`"
            )));
        }
        let entries = sections.entry(section).or_default();
        if entries.contains_key(key) {
            return Err(TesseraError::configuration(format!(
                "line {line_no}: `{key}` defined twice in [{}]",
                section.header()
            )));
        }
        entries.insert(key.to_string(), value.to_string());
    }

    if !pending.is_empty() {
        return Err(TesseraError::configuration(format!(
            "line {pending_line}: continuation at end of model"
        )));
    }
    Ok(sections)
}
