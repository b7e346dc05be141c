//! Matcher language
//!
//! A matcher decides whether one policy rule applies to one request. The text
//! is compiled once, when the model is built, into an [`Expr`] tree whose
//! operands are already bound to field positions. Evaluation is a pure
//! function of that tree, the two tuples, and a read-only membership oracle.

mod lexer;
mod parser;

use crate::schema::{PolicySchema, RelationDefinition, RequestSchema};
use indexmap::IndexMap;
use tessera_core::{Result, GLOBAL_DOMAIN};

/// Answers `Rel(from, to, domain)` membership questions during evaluation
pub trait MembershipOracle {
    /// Whether `to` is reachable from `from` (reflexively, transitively) in
    /// relation number `relation` within `domain`
    fn is_member(&self, relation: usize, from: &str, to: &str, domain: &str) -> bool;
}

/// A value referenced by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Request field at this position
    Request(usize),
    /// Policy field at this position
    Policy(usize),
    /// Quoted literal
    Literal(String),
}

impl Operand {
    /// Value of the operand for this request/rule pair
    pub fn resolve<'a>(&'a self, request: &[&'a str], rule: &'a [String]) -> &'a str {
        match self {
            Operand::Request(idx) => request.get(*idx).copied().unwrap_or_default(),
            Operand::Policy(idx) => rule.get(*idx).map(String::as_str).unwrap_or_default(),
            Operand::Literal(value) => value,
        }
    }
}

/// Compiled matcher expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `rel(from, to[, domain])`
    Membership {
        /// Index of the relation in model declaration order
        relation: usize,
        /// Member being tested
        from: Operand,
        /// Ancestor or group
        to: Operand,
        /// Domain, absent for two-field relations
        domain: Option<Operand>,
    },
    /// `a == b`, exact and case-sensitive
    Equals(Operand, Operand),
    /// `a && b`
    And(Box<Expr>, Box<Expr>),
    /// `a || b`
    Or(Box<Expr>, Box<Expr>),
    /// `!a`
    Not(Box<Expr>),
}

impl Expr {
    /// Evaluate against one request and one rule
    pub fn evaluate(
        &self,
        request: &[&str],
        rule: &[String],
        oracle: &dyn MembershipOracle,
    ) -> bool {
        match self {
            Expr::Membership {
                relation,
                from,
                to,
                domain,
            } => {
                let domain = domain
                    .as_ref()
                    .map_or(GLOBAL_DOMAIN, |d| d.resolve(request, rule));
                oracle.is_member(
                    *relation,
                    from.resolve(request, rule),
                    to.resolve(request, rule),
                    domain,
                )
            }
            Expr::Equals(a, b) => a.resolve(request, rule) == b.resolve(request, rule),
            Expr::And(a, b) => {
                a.evaluate(request, rule, oracle) && b.evaluate(request, rule, oracle)
            }
            Expr::Or(a, b) => a.evaluate(request, rule, oracle) || b.evaluate(request, rule, oracle),
            Expr::Not(inner) => !inner.evaluate(request, rule, oracle),
        }
    }

    /// Relations referenced anywhere in the tree
    pub fn relations(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_relations(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Policy field holding the domain of `relation`
    ///
    /// Either the relation call takes a policy field as its domain directly,
    /// or it takes a request field that an equality elsewhere in the tree binds
    /// to a policy field (`g(r.sub, p.sub, r.dom) && r.dom == p.dom`).
    pub fn policy_domain_field(&self, relation: usize) -> Option<usize> {
        let mut domains = Vec::new();
        self.collect_domains(relation, &mut domains);
        domains.into_iter().find_map(|operand| match operand {
            Operand::Policy(idx) => Some(*idx),
            Operand::Request(idx) => self.policy_bound_to(*idx),
            Operand::Literal(_) => None,
        })
    }

    fn collect_domains<'a>(&'a self, relation: usize, out: &mut Vec<&'a Operand>) {
        match self {
            Expr::Membership {
                relation: r,
                domain: Some(d),
                ..
            } if *r == relation => out.push(d),
            Expr::Membership { .. } | Expr::Equals(..) => {}
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_domains(relation, out);
                b.collect_domains(relation, out);
            }
            Expr::Not(inner) => inner.collect_domains(relation, out),
        }
    }

    fn policy_bound_to(&self, request_field: usize) -> Option<usize> {
        match self {
            Expr::Equals(Operand::Request(r), Operand::Policy(p))
            | Expr::Equals(Operand::Policy(p), Operand::Request(r))
                if *r == request_field =>
            {
                Some(*p)
            }
            Expr::And(a, b) => a
                .policy_bound_to(request_field)
                .or_else(|| b.policy_bound_to(request_field)),
            _ => None,
        }
    }

    fn collect_relations(&self, out: &mut Vec<usize>) {
        match self {
            Expr::Membership { relation, .. } => out.push(*relation),
            Expr::Equals(..) => {}
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_relations(out);
                b.collect_relations(out);
            }
            Expr::Not(inner) => inner.collect_relations(out),
        }
    }
}

/// Declarations a matcher may reference
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Request schemas by key
    pub requests: &'a IndexMap<String, RequestSchema>,
    /// Policy schemas by key
    pub policies: &'a IndexMap<String, PolicySchema>,
    /// Relations by name
    pub relations: &'a IndexMap<String, RelationDefinition>,
}

/// A compiled, named matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    key: String,
    text: String,
    expr: Expr,
    request_key: Option<String>,
    policy_key: Option<String>,
}

impl Matcher {
    /// Compile matcher text against the declarations in `scope`
    pub fn compile(key: impl Into<String>, text: &str, scope: Scope<'_>) -> Result<Self> {
        let key = key.into();
        let compiled = parser::parse(text, scope)?;
        tracing::debug!(
            matcher = %key,
            relations = compiled.expr.relations().len(),
            "Compiled matcher"
        );
        Ok(Self {
            key,
            text: text.trim().to_string(),
            expr: compiled.expr,
            request_key: compiled.request_key,
            policy_key: compiled.policy_key,
        })
    }

    /// Section key (`m`, `m2`, ...)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Compiled tree
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Request key the matcher reads from, if it reads any request field
    pub fn request_key(&self) -> Option<&str> {
        self.request_key.as_deref()
    }

    /// Policy key the matcher reads from, if it reads any policy field
    pub fn policy_key(&self) -> Option<&str> {
        self.policy_key.as_deref()
    }

    /// Whether `rule` applies to `request`
    pub fn matches(&self, request: &[&str], rule: &[String], oracle: &dyn MembershipOracle) -> bool {
        self.expr.evaluate(request, rule, oracle)
    }
}
