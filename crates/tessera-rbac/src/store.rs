//! Ordered, deduplicated policy and grouping tuples
//!
//! Listing preserves insertion order; removal keeps the order of the remaining
//! tuples. Evaluation never depends on that order.

use indexmap::{IndexMap, IndexSet};
use tessera_core::{PolicySnapshot, Record, Rule};
use tessera_model::Model;

/// In-memory tuple store keyed by policy type and relation name
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    policies: IndexMap<String, IndexSet<Rule>>,
    groupings: IndexMap<String, IndexSet<Rule>>,
}

impl PolicyStore {
    /// Empty store with a slot for every policy type and relation of `model`
    pub fn for_model(model: &Model) -> Self {
        let mut store = Self::default();
        for policy in model.policies() {
            store.policies.insert(policy.key().to_string(), IndexSet::new());
        }
        for relation in model.relations() {
            store
                .groupings
                .insert(relation.name().to_string(), IndexSet::new());
        }
        store
    }

    /// Policy rules of one type, in insertion order
    pub fn policies(&self, ptype: &str) -> impl Iterator<Item = &Rule> {
        self.policies.get(ptype).into_iter().flatten()
    }

    /// Grouping tuples of one relation, in insertion order
    pub fn groupings(&self, relation: &str) -> impl Iterator<Item = &Rule> {
        self.groupings.get(relation).into_iter().flatten()
    }

    /// Whether a policy rule is stored
    pub fn has_policy(&self, ptype: &str, rule: &Rule) -> bool {
        self.policies.get(ptype).is_some_and(|set| set.contains(rule))
    }

    /// Whether a grouping tuple is stored
    pub fn has_grouping(&self, relation: &str, rule: &Rule) -> bool {
        self.groupings
            .get(relation)
            .is_some_and(|set| set.contains(rule))
    }

    /// Insert a policy rule; false if already present
    pub fn add_policy(&mut self, ptype: &str, rule: Rule) -> bool {
        self.policies
            .entry(ptype.to_string())
            .or_default()
            .insert(rule)
    }

    /// Remove a policy rule; false if absent
    pub fn remove_policy(&mut self, ptype: &str, rule: &Rule) -> bool {
        self.policies
            .get_mut(ptype)
            .is_some_and(|set| set.shift_remove(rule))
    }

    /// Insert a grouping tuple; false if already present
    pub fn add_grouping(&mut self, relation: &str, rule: Rule) -> bool {
        self.groupings
            .entry(relation.to_string())
            .or_default()
            .insert(rule)
    }

    /// Remove a grouping tuple; false if absent
    pub fn remove_grouping(&mut self, relation: &str, rule: &Rule) -> bool {
        self.groupings
            .get_mut(relation)
            .is_some_and(|set| set.shift_remove(rule))
    }

    /// Number of policy rules across all types
    pub fn policy_count(&self) -> usize {
        self.policies.values().map(IndexSet::len).sum()
    }

    /// Number of grouping tuples across all relations
    pub fn grouping_count(&self) -> usize {
        self.groupings.values().map(IndexSet::len).sum()
    }

    /// Remove everything, keeping the declared slots
    pub fn clear(&mut self) {
        self.policies.values_mut().for_each(IndexSet::clear);
        self.groupings.values_mut().for_each(IndexSet::clear);
    }

    /// Flatten into storage records: policies first, then groupings
    pub fn snapshot(&self) -> PolicySnapshot {
        let policies = self
            .policies
            .iter()
            .flat_map(|(ptype, set)| set.iter().map(move |r| Record::new(ptype.clone(), r.clone())));
        let groupings = self
            .groupings
            .iter()
            .flat_map(|(name, set)| set.iter().map(move |r| Record::new(name.clone(), r.clone())));
        PolicySnapshot::new(policies.chain(groupings).collect())
    }
}
