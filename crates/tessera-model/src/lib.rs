//! # Tessera Model - Model Definition
//!
//! **Purpose**: Parse and check the declarative access-control model.
//!
//! A model names the request fields, the policy fields, the grouping relations
//! (`g`, `g2`, ...), how matched effects combine, and the matcher deciding
//! whether a rule applies to a request:
//!
//! ```text
//! [request_definition]
//! r = sub, dom, obj, act
//! [policy_definition]
//! p = sub, dom, obj, act, eft
//! [role_definition]
//! g = _, _, _
//! [policy_effect]
//! e = some(where (p.eft == allow)) && !some(where (p.eft == deny))
//! [matchers]
//! m = g(r.sub, p.sub, r.dom) && r.dom == p.dom && r.obj == p.obj && r.act == p.act
//! ```
//!
//! Matchers are compiled once into an [`Expr`] tree. Evaluation asks a
//! [`MembershipOracle`] for relation membership, which keeps this crate free of
//! graph storage; `tessera-rbac` supplies the oracle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Model text parsing and enforcement contexts
pub mod definition;

/// Effect combinators
pub mod effect;

/// Matcher language
pub mod matcher;

/// Request, policy and relation schemas
pub mod schema;

pub use definition::{EnforceContext, Model, ResolvedContext};
pub use effect::{parse_effect_expression, AllowOverride, AllowUnlessDeny, EffectCombinator};
pub use matcher::{Expr, Matcher, MembershipOracle, Operand, Scope};
pub use schema::{PolicySchema, RelationDefinition, RequestSchema, EFFECT_FIELD};
