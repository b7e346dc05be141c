//! Enforcement engine
//!
//! An [`Enforcer`] owns the model, the policy store and one relation graph per
//! declared relation. All state sits behind a single `RwLock`:
//!
//! - enforcement holds the read lock for the whole call, so it sees the store
//!   and the graphs from the same instant and never a half-applied mutation;
//! - mutations hold the write lock across validation, the storage write and
//!   the in-memory update, so they never interleave or lose updates.
//!
//! Storage is written before memory. When the adapter fails the error is
//! returned and memory is left exactly as it was.

use crate::decision::{Decision, MatchedRule};
use crate::evaluator::GraphOracle;
use crate::graph::RelationGraph;
use crate::store::PolicyStore;
use indexmap::IndexSet;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessera_core::{Adapter, EnforcerConfig, PolicySnapshot, Record, Result, Rule, TesseraError};
use tessera_model::{EnforceContext, Model, RelationDefinition};

/// Policy type used by the unnamed policy operations
pub const DEFAULT_POLICY: &str = "p";

/// Relation used by the unnamed grouping operations and the role helpers
pub const DEFAULT_RELATION: &str = "g";

#[derive(Debug, Clone)]
pub(crate) struct EngineState {
    pub(crate) store: PolicyStore,
    pub(crate) graphs: Vec<RelationGraph>,
}

impl EngineState {
    fn empty(model: &Model) -> Self {
        Self {
            store: PolicyStore::for_model(model),
            graphs: model.relations().map(|_| RelationGraph::new()).collect(),
        }
    }

    /// Build state from stored records, validating each against the model
    fn from_snapshot(model: &Model, snapshot: PolicySnapshot) -> Result<Self> {
        let mut state = Self::empty(model);
        for record in snapshot.records {
            if let Some(schema) = model.policy(&record.ptype) {
                schema.validate(&record.rule)?;
                state.store.add_policy(&record.ptype, record.rule);
            } else if let Some((idx, def)) = model.relation_full(&record.ptype) {
                def.validate(&record.rule)?;
                let (child, parent, domain) = edge_parts(def, &record.rule);
                state.graphs[idx].add_edge(child, parent, domain);
                state.store.add_grouping(&record.ptype, record.rule);
            } else {
                return Err(TesseraError::validation(format!(
                    "stored record `{record}` has an undeclared type `{}`",
                    record.ptype
                )));
            }
        }
        Ok(state)
    }
}

/// Split a validated grouping tuple into `(child, parent, domain)`
pub(crate) fn edge_parts<'r>(def: &RelationDefinition, rule: &'r Rule) -> (&'r str, &'r str, &'r str) {
    let domain = if def.has_domain() {
        rule[2].as_str()
    } else {
        tessera_core::GLOBAL_DOMAIN
    };
    (rule[0].as_str(), rule[1].as_str(), domain)
}

/// Domain-scoped RBAC enforcer
pub struct Enforcer {
    model: Arc<Model>,
    pub(crate) state: RwLock<EngineState>,
    adapter: Option<Box<dyn Adapter>>,
    auto_save: AtomicBool,
}

impl std::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Enforcer")
            .field("model", &self.model)
            .field("policies", &state.store.policy_count())
            .field("groupings", &state.store.grouping_count())
            .field("adapter", &self.adapter.is_some())
            .field("auto_save", &self.auto_save.load(Ordering::Relaxed))
            .finish()
    }
}

impl Enforcer {
    /// Enforcer with no storage; state lives only in memory
    pub fn new(model: Model) -> Self {
        let state = EngineState::empty(&model);
        Self {
            model: Arc::new(model),
            state: RwLock::new(state),
            adapter: None,
            auto_save: AtomicBool::new(false),
        }
    }

    /// Enforcer backed by `adapter`, loading everything it holds
    ///
    /// Mutations are written through to the adapter until
    /// [`set_auto_save`](Self::set_auto_save) turns that off.
    pub fn with_adapter(model: Model, adapter: impl Adapter + 'static) -> Result<Self> {
        let snapshot = adapter.load_all()?;
        let loaded = snapshot.len();
        let state = EngineState::from_snapshot(&model, snapshot)?;
        tracing::info!(
            records = loaded,
            policies = state.store.policy_count(),
            groupings = state.store.grouping_count(),
            "Loaded policy from storage"
        );
        Ok(Self {
            model: Arc::new(model),
            state: RwLock::new(state),
            adapter: Some(Box::new(adapter)),
            auto_save: AtomicBool::new(true),
        })
    }

    /// Build an enforcer from configuration: model, backend and save mode
    pub fn from_config(config: &EnforcerConfig) -> Result<Self> {
        config.validate()?;
        let model = Model::from_text(&config.model_text()?)?;
        let adapter = tessera_store::adapter_from_config(&config.storage)?;
        let enforcer = Self::with_adapter(model, adapter)?;
        enforcer.set_auto_save(config.storage.auto_save);
        tracing::info!(
            backend = ?config.storage.backend,
            auto_save = config.storage.auto_save,
            "Enforcer ready"
        );
        Ok(enforcer)
    }

    /// The model this enforcer evaluates
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Toggle write-through of mutations to the adapter
    pub fn set_auto_save(&self, enabled: bool) {
        self.auto_save.store(enabled, Ordering::Relaxed);
    }

    /// Whether mutations are written through
    pub fn auto_save(&self) -> bool {
        self.auto_save.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Enforcement
    // ------------------------------------------------------------------

    /// Decide a request using the default `r`/`p`/`e`/`m` context
    pub fn enforce<S: AsRef<str>>(&self, request: &[S]) -> Result<bool> {
        self.enforce_with(&EnforceContext::default(), request)
    }

    /// Decide a request using an explicit context
    pub fn enforce_with<S: AsRef<str>>(&self, ctx: &EnforceContext, request: &[S]) -> Result<bool> {
        Ok(self.evaluate(ctx, request, false)?.allowed)
    }

    /// Decide a request and report every matched rule
    pub fn explain<S: AsRef<str>>(&self, request: &[S]) -> Result<Decision> {
        self.evaluate(&EnforceContext::default(), request, true)
    }

    /// [`explain`](Self::explain) with an explicit context
    pub fn explain_with<S: AsRef<str>>(&self, ctx: &EnforceContext, request: &[S]) -> Result<Decision> {
        self.evaluate(ctx, request, true)
    }

    fn evaluate<S: AsRef<str>>(
        &self,
        ctx: &EnforceContext,
        request: &[S],
        explain: bool,
    ) -> Result<Decision> {
        let resolved = self.model.resolve(ctx)?;
        resolved.request.validate(request)?;
        let request: Vec<&str> = request.iter().map(AsRef::as_ref).collect();

        let state = self.state.read();
        let oracle = GraphOracle::new(&state.graphs);
        let mut effects = Vec::new();
        let mut matched = Vec::new();
        for rule in state.store.policies(&ctx.policy) {
            if !resolved.matcher.matches(&request, rule, &oracle) {
                continue;
            }
            let effect = resolved.policy.effect_of(rule);
            tracing::trace!(rule = %rule, %effect, "Rule matched");
            effects.push(effect);
            if explain {
                matched.push(MatchedRule {
                    rule: rule.clone(),
                    effect,
                });
            }
        }
        drop(oracle);
        drop(state);

        let allowed = resolved.effect.combine(&effects);
        tracing::debug!(
            request = ?request,
            matched = effects.len(),
            combinator = resolved.effect.name(),
            allowed,
            "Enforced request"
        );
        Ok(Decision { allowed, matched })
    }

    /// Whether `to` is reachable from `from` in `relation`
    ///
    /// `domain` must be given exactly when the relation declares one.
    pub fn reachable(&self, relation: &str, from: &str, to: &str, domain: Option<&str>) -> Result<bool> {
        let (idx, def) = self.relation(relation)?;
        let domain = domain_key(def, domain)?;
        Ok(self.state.read().graphs[idx].reachable(from, to, domain))
    }

    // ------------------------------------------------------------------
    // Policies
    // ------------------------------------------------------------------

    /// Add a rule to policy `p`
    pub fn add_policy<S: AsRef<str>>(&self, rule: &[S]) -> Result<bool> {
        self.add_named_policy(DEFAULT_POLICY, rule)
    }

    /// Add a rule to a named policy type
    pub fn add_named_policy<S: AsRef<str>>(&self, ptype: &str, rule: &[S]) -> Result<bool> {
        let rule = self.checked_policy(ptype, rule)?;
        let mut state = self.state.write();
        if state.store.has_policy(ptype, &rule) {
            return Ok(false);
        }
        self.persist(|a| a.add_record(&Record::new(ptype, rule.clone())))?;
        tracing::debug!(ptype, rule = %rule, "Added policy");
        state.store.add_policy(ptype, rule);
        Ok(true)
    }

    /// Add several rules to policy `p`
    pub fn add_policies<S: AsRef<str>>(&self, rules: &[Vec<S>]) -> Result<bool> {
        self.add_named_policies(DEFAULT_POLICY, rules)
    }

    /// Add several rules to a named policy type in one step
    ///
    /// Every rule is validated before anything is written; rules already
    /// stored are skipped. Returns true when at least one rule was added.
    pub fn add_named_policies<S: AsRef<str>>(&self, ptype: &str, rules: &[Vec<S>]) -> Result<bool> {
        let rules = rules
            .iter()
            .map(|r| self.checked_policy(ptype, r))
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.write();
        let fresh: IndexSet<Rule> = rules
            .into_iter()
            .filter(|rule| !state.store.has_policy(ptype, rule))
            .collect();
        if fresh.is_empty() {
            return Ok(false);
        }
        let records: Vec<Record> = fresh.iter().map(|r| Record::new(ptype, r.clone())).collect();
        self.persist(|a| a.add_records(&records))?;
        tracing::debug!(ptype, added = fresh.len(), "Added policies");
        for rule in fresh {
            state.store.add_policy(ptype, rule);
        }
        Ok(true)
    }

    /// Remove a rule from policy `p`
    pub fn remove_policy<S: AsRef<str>>(&self, rule: &[S]) -> Result<bool> {
        self.remove_named_policy(DEFAULT_POLICY, rule)
    }

    /// Remove a rule from a named policy type
    pub fn remove_named_policy<S: AsRef<str>>(&self, ptype: &str, rule: &[S]) -> Result<bool> {
        let rule = self.checked_policy(ptype, rule)?;
        let mut state = self.state.write();
        if !state.store.has_policy(ptype, &rule) {
            return Ok(false);
        }
        self.persist(|a| a.remove_record(&Record::new(ptype, rule.clone())))?;
        tracing::debug!(ptype, rule = %rule, "Removed policy");
        state.store.remove_policy(ptype, &rule);
        Ok(true)
    }

    /// Remove every rule whose fields starting at `field_index` equal
    /// `field_values`; an empty value matches anything
    pub fn remove_filtered_named_policy<S: AsRef<str>>(
        &self,
        ptype: &str,
        field_index: usize,
        field_values: &[S],
    ) -> Result<bool> {
        let schema = self
            .model
            .policy(ptype)
            .ok_or_else(|| TesseraError::validation(format!("model declares no policy `{ptype}`")))?;
        if field_values.is_empty() || field_index + field_values.len() > schema.arity() {
            return Err(TesseraError::validation(format!(
                "filter at field {field_index} with {} values does not fit policy `{ptype}`",
                field_values.len()
            )));
        }

        let mut state = self.state.write();
        let doomed: Vec<Rule> = state
            .store
            .policies(ptype)
            .filter(|rule| {
                field_values.iter().enumerate().all(|(i, v)| {
                    let v = v.as_ref();
                    v.is_empty() || rule[field_index + i] == v
                })
            })
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Ok(false);
        }
        let records: Vec<Record> = doomed.iter().map(|r| Record::new(ptype, r.clone())).collect();
        self.persist(|a| a.remove_records(&records))?;
        tracing::debug!(ptype, removed = doomed.len(), "Removed filtered policies");
        for rule in &doomed {
            state.store.remove_policy(ptype, rule);
        }
        Ok(true)
    }

    /// Whether policy `p` holds the rule
    pub fn has_policy<S: AsRef<str>>(&self, rule: &[S]) -> Result<bool> {
        self.has_named_policy(DEFAULT_POLICY, rule)
    }

    /// Whether a named policy type holds the rule
    pub fn has_named_policy<S: AsRef<str>>(&self, ptype: &str, rule: &[S]) -> Result<bool> {
        let rule = self.checked_policy(ptype, rule)?;
        Ok(self.state.read().store.has_policy(ptype, &rule))
    }

    /// Rules of policy `p`, in insertion order
    pub fn get_policy(&self) -> Result<Vec<Rule>> {
        self.get_named_policy(DEFAULT_POLICY)
    }

    /// Rules of a named policy type, in insertion order
    pub fn get_named_policy(&self, ptype: &str) -> Result<Vec<Rule>> {
        if self.model.policy(ptype).is_none() {
            return Err(TesseraError::validation(format!(
                "model declares no policy `{ptype}`"
            )));
        }
        Ok(self.state.read().store.policies(ptype).cloned().collect())
    }

    // ------------------------------------------------------------------
    // Groupings
    // ------------------------------------------------------------------

    /// Add a tuple to relation `g`
    pub fn add_grouping_policy<S: AsRef<str>>(&self, rule: &[S]) -> Result<bool> {
        self.add_named_grouping_policy(DEFAULT_RELATION, rule)
    }

    /// Add a `(child, parent[, domain])` tuple to a named relation
    pub fn add_named_grouping_policy<S: AsRef<str>>(&self, relation: &str, rule: &[S]) -> Result<bool> {
        let (idx, def, rule) = self.checked_grouping(relation, rule)?;
        let mut state = self.state.write();
        if state.store.has_grouping(relation, &rule) {
            return Ok(false);
        }
        self.persist(|a| a.add_record(&Record::new(relation, rule.clone())))?;
        let (child, parent, domain) = edge_parts(def, &rule);
        state.graphs[idx].add_edge(child, parent, domain);
        tracing::debug!(relation, rule = %rule, "Added grouping");
        state.store.add_grouping(relation, rule);
        Ok(true)
    }

    /// Remove a tuple from relation `g`
    pub fn remove_grouping_policy<S: AsRef<str>>(&self, rule: &[S]) -> Result<bool> {
        self.remove_named_grouping_policy(DEFAULT_RELATION, rule)
    }

    /// Remove a tuple from a named relation
    pub fn remove_named_grouping_policy<S: AsRef<str>>(&self, relation: &str, rule: &[S]) -> Result<bool> {
        let (idx, def, rule) = self.checked_grouping(relation, rule)?;
        let mut state = self.state.write();
        if !state.store.has_grouping(relation, &rule) {
            return Ok(false);
        }
        self.persist(|a| a.remove_record(&Record::new(relation, rule.clone())))?;
        let (child, parent, domain) = edge_parts(def, &rule);
        state.graphs[idx].remove_edge(child, parent, domain);
        tracing::debug!(relation, rule = %rule, "Removed grouping");
        state.store.remove_grouping(relation, &rule);
        Ok(true)
    }

    /// Whether relation `g` holds the tuple
    pub fn has_grouping_policy<S: AsRef<str>>(&self, rule: &[S]) -> Result<bool> {
        self.has_named_grouping_policy(DEFAULT_RELATION, rule)
    }

    /// Whether a named relation holds the tuple
    pub fn has_named_grouping_policy<S: AsRef<str>>(&self, relation: &str, rule: &[S]) -> Result<bool> {
        let (_, _, rule) = self.checked_grouping(relation, rule)?;
        Ok(self.state.read().store.has_grouping(relation, &rule))
    }

    /// Tuples of relation `g`, in insertion order
    pub fn get_grouping_policy(&self) -> Result<Vec<Rule>> {
        self.get_named_grouping_policy(DEFAULT_RELATION)
    }

    /// Tuples of a named relation, in insertion order
    pub fn get_named_grouping_policy(&self, relation: &str) -> Result<Vec<Rule>> {
        self.relation(relation)?;
        Ok(self.state.read().store.groupings(relation).cloned().collect())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Replace all in-memory state with what the adapter holds
    ///
    /// The new state is built aside and swapped in only if every record is
    /// valid, so a failed reload leaves the previous state in place.
    pub fn load_policy(&self) -> Result<()> {
        let adapter = self.require_adapter()?;
        let mut state = self.state.write();
        let snapshot = adapter.load_all()?;
        let fresh = EngineState::from_snapshot(&self.model, snapshot)?;
        tracing::info!(
            policies = fresh.store.policy_count(),
            groupings = fresh.store.grouping_count(),
            "Reloaded policy"
        );
        *state = fresh;
        Ok(())
    }

    /// Write the full in-memory state to the adapter
    pub fn save_policy(&self) -> Result<()> {
        let adapter = self.require_adapter()?;
        let state = self.state.read();
        let snapshot = state.store.snapshot();
        adapter.save_all(&snapshot).inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to save policy");
        })?;
        tracing::info!(records = snapshot.len(), "Saved policy");
        Ok(())
    }

    /// Drop every rule and tuple from memory; storage is untouched until the
    /// next [`save_policy`](Self::save_policy)
    pub fn clear_policy(&self) {
        let mut state = self.state.write();
        state.store.clear();
        state.graphs.iter_mut().for_each(RelationGraph::clear);
        tracing::debug!("Cleared in-memory policy");
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_adapter(&self) -> Result<&dyn Adapter> {
        self.adapter
            .as_deref()
            .ok_or_else(|| TesseraError::storage("no storage adapter configured"))
    }

    /// Run a storage write when write-through is active
    fn persist(&self, write: impl FnOnce(&dyn Adapter) -> Result<()>) -> Result<()> {
        let Some(adapter) = self.adapter.as_deref() else {
            return Ok(());
        };
        if !self.auto_save() {
            return Ok(());
        }
        write(adapter).inspect_err(|e| {
            tracing::warn!(error = %e, "Storage write failed; mutation not applied");
        })
    }

    fn checked_policy<S: AsRef<str>>(&self, ptype: &str, values: &[S]) -> Result<Rule> {
        let schema = self
            .model
            .policy(ptype)
            .ok_or_else(|| TesseraError::validation(format!("model declares no policy `{ptype}`")))?;
        let rule = Rule::from(values);
        schema.validate(&rule)?;
        Ok(rule)
    }

    pub(crate) fn relation(&self, name: &str) -> Result<(usize, &RelationDefinition)> {
        self.model
            .relation_full(name)
            .ok_or_else(|| TesseraError::validation(format!("model declares no relation `{name}`")))
    }

    fn checked_grouping<S: AsRef<str>>(
        &self,
        relation: &str,
        values: &[S],
    ) -> Result<(usize, &RelationDefinition, Rule)> {
        let (idx, def) = self.relation(relation)?;
        let rule = Rule::from(values);
        def.validate(&rule)?;
        Ok((idx, def, rule))
    }
}

/// Graph key for a caller-supplied domain
pub(crate) fn domain_key<'d>(def: &RelationDefinition, domain: Option<&'d str>) -> Result<&'d str> {
    match (def.has_domain(), domain) {
        (true, Some(d)) => Ok(d),
        (false, None) => Ok(tessera_core::GLOBAL_DOMAIN),
        (true, None) => Err(TesseraError::validation(format!(
            "relation `{}` is domain-scoped; a domain is required",
            def.name()
        ))),
        (false, Some(_)) => Err(TesseraError::validation(format!(
            "relation `{}` has no domain field",
            def.name()
        ))),
    }
}
