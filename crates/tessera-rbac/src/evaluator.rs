//! Membership oracle backed by the relation graphs
//!
//! Lives for one enforcement call. The first question about a given
//! `(relation, member, domain)` walks the graph once and memoises the full
//! ancestor set, so scanning many rules for the same subject or object does not
//! repeat the traversal.

use crate::graph::RelationGraph;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tessera_model::MembershipOracle;

type AncestorCache = HashMap<String, HashMap<String, HashSet<String>>>;

/// Read-only view of the relation graphs with a per-call reachability cache
pub struct GraphOracle<'a> {
    graphs: &'a [RelationGraph],
    cache: RefCell<Vec<AncestorCache>>,
}

impl<'a> GraphOracle<'a> {
    /// Wrap the graphs, indexed in model relation order
    pub fn new(graphs: &'a [RelationGraph]) -> Self {
        Self {
            graphs,
            cache: RefCell::new(vec![AncestorCache::new(); graphs.len()]),
        }
    }
}

impl MembershipOracle for GraphOracle<'_> {
    fn is_member(&self, relation: usize, from: &str, to: &str, domain: &str) -> bool {
        if from == to {
            return true;
        }
        let Some(graph) = self.graphs.get(relation) else {
            return false;
        };

        let mut cache = self.cache.borrow_mut();
        let Some(per_relation) = cache.get_mut(relation) else {
            return graph.reachable(from, to, domain);
        };
        if let Some(known) = per_relation.get(domain).and_then(|m| m.get(from)) {
            return known.contains(to);
        }
        let ancestors = graph.ancestors(from, domain);
        let found = ancestors.contains(to);
        per_relation
            .entry(domain.to_string())
            .or_default()
            .insert(from.to_string(), ancestors);
        found
    }
}
