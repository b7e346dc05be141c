//! # Tessera RBAC - Enforcement Engine
//!
//! **Purpose**: Decide allow/deny for requests against a parsed model, a
//! policy store and domain-scoped relation graphs.
//!
//! - `Enforcer`: the public engine; enforcement, policy and grouping
//!   mutation, queries, role helpers and storage lifecycle
//! - `RelationGraph`: per-relation, per-domain reachability over petgraph
//! - `PolicyStore`: ordered, deduplicated rule and tuple storage
//! - `Decision`: an enforcement outcome with the rules that produced it
//!
//! ```text
//! let enforcer = Enforcer::new(Model::from_text(MODEL)?);
//! enforcer.add_policy(&["role:PUBLIC", "d1", "m1", "predict", "allow"])?;
//! enforcer.add_role_for_user("john", "role:PUBLIC", Some("d1"))?;
//! assert!(enforcer.enforce(&["john", "d1", "m1", "predict"])?);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Enforcement outcomes
pub mod decision;

/// The enforcer
pub mod enforcer;

/// Membership oracle over the relation graphs
pub mod evaluator;

/// Domain-scoped relation graphs
pub mod graph;

/// Role helpers on the default relation
pub mod rbac;

/// Rule and tuple storage
pub mod store;

pub use decision::{Decision, MatchedRule};
pub use enforcer::{Enforcer, DEFAULT_POLICY, DEFAULT_RELATION};
pub use graph::RelationGraph;
pub use store::PolicyStore;

pub use tessera_core::{Adapter, EnforcerConfig, Result, Rule, TesseraError};
pub use tessera_model::{EnforceContext, Model};
