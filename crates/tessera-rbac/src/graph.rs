//! Domain-scoped relation graphs
//!
//! One [`RelationGraph`] exists per named relation. Inside it, every domain
//! owns an independent directed graph; edges never connect nodes of different
//! domains, so traversal cannot leak across tenants.
//!
//! Edges point child to parent. `reachable(x, y, d)` holds when `x == y` or a
//! path of edges leads from `x` to `y` inside domain `d`. Cycles are legal and
//! simply make their members mutually reachable; traversal keeps a visited set
//! and always terminates.

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
struct DomainGraph {
    graph: StableDiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DomainGraph {
    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, child: &str, parent: &str) -> bool {
        let c = self.node(child);
        let p = self.node(parent);
        if self.graph.find_edge(c, p).is_some() {
            return false;
        }
        self.graph.add_edge(c, p, ());
        true
    }

    fn remove_edge(&mut self, child: &str, parent: &str) -> bool {
        let (Some(&c), Some(&p)) = (self.nodes.get(child), self.nodes.get(parent)) else {
            return false;
        };
        let Some(edge) = self.graph.find_edge(c, p) else {
            return false;
        };
        self.graph.remove_edge(edge);
        self.prune(c);
        if p != c {
            self.prune(p);
        }
        true
    }

    /// Drop a node once no edge touches it
    fn prune(&mut self, idx: NodeIndex) {
        if self.graph.neighbors_undirected(idx).next().is_none() {
            if let Some(name) = self.graph.remove_node(idx) {
                self.nodes.remove(&name);
            }
        }
    }

    fn reachable(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let (Some(&start), Some(&goal)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return false;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            if idx == goal {
                return true;
            }
        }
        false
    }

    fn ancestors(&self, from: &str, out: &mut HashSet<String>) {
        let Some(&start) = self.nodes.get(from) else {
            return;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            out.insert(self.graph[idx].clone());
        }
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort_unstable();
        out
    }

    fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Reachability graph of one named relation, partitioned by domain
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    domains: HashMap<String, DomainGraph>,
}

impl RelationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `child -> parent` in `domain`; false if the edge already exists
    pub fn add_edge(&mut self, child: &str, parent: &str, domain: &str) -> bool {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .add_edge(child, parent)
    }

    /// Remove `child -> parent` from `domain`; false if it was absent
    pub fn remove_edge(&mut self, child: &str, parent: &str, domain: &str) -> bool {
        let Some(graph) = self.domains.get_mut(domain) else {
            return false;
        };
        let removed = graph.remove_edge(child, parent);
        if graph.edge_count() == 0 {
            self.domains.remove(domain);
        }
        removed
    }

    /// Whether `to` is reachable from `from` in `domain`, reflexively
    pub fn reachable(&self, from: &str, to: &str, domain: &str) -> bool {
        if from == to {
            return true;
        }
        self.domains
            .get(domain)
            .is_some_and(|g| g.reachable(from, to))
    }

    /// Every node reachable from `from` in `domain`, including `from` itself
    pub fn ancestors(&self, from: &str, domain: &str) -> HashSet<String> {
        let mut out = HashSet::new();
        out.insert(from.to_string());
        if let Some(graph) = self.domains.get(domain) {
            graph.ancestors(from, &mut out);
        }
        out
    }

    /// Direct parents of `child` in `domain`, sorted
    pub fn parents(&self, child: &str, domain: &str) -> Vec<String> {
        self.domains
            .get(domain)
            .map(|g| g.neighbors(child, Direction::Outgoing))
            .unwrap_or_default()
    }

    /// Direct children of `parent` in `domain`, sorted
    pub fn children(&self, parent: &str, domain: &str) -> Vec<String> {
        self.domains
            .get(domain)
            .map(|g| g.neighbors(parent, Direction::Incoming))
            .unwrap_or_default()
    }

    /// Total number of edges across domains
    pub fn edge_count(&self) -> usize {
        self.domains.values().map(DomainGraph::edge_count).sum()
    }

    /// Remove every edge
    pub fn clear(&mut self) {
        self.domains.clear();
    }
}
