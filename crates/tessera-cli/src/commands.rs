//! Subcommand handlers
//!
//! Each handler writes its result to the given writer so it can be checked
//! without spawning the binary.

use anyhow::Result;
use std::io::{self, Write};
use tessera_rbac::{Enforcer, DEFAULT_POLICY, DEFAULT_RELATION};

pub fn check(enforcer: &Enforcer) -> Result<()> {
    check_to(enforcer, &mut io::stdout().lock())
}

pub fn enforce(enforcer: &Enforcer, fields: &[String], explain: bool) -> Result<()> {
    enforce_to(enforcer, fields, explain, &mut io::stdout().lock())
}

pub fn list(enforcer: &Enforcer, grouping: bool, ptype: Option<&str>) -> Result<()> {
    list_to(enforcer, grouping, ptype, &mut io::stdout().lock())
}

pub fn roles(enforcer: &Enforcer, user: &str, domain: Option<&str>, implicit: bool) -> Result<()> {
    roles_to(enforcer, user, domain, implicit, &mut io::stdout().lock())
}

fn check_to(enforcer: &Enforcer, out: &mut impl Write) -> Result<()> {
    let model = enforcer.model();
    for policy in model.policies() {
        let rules = enforcer.get_named_policy(policy.key())?;
        writeln!(out, "{}: {} rules", policy.key(), rules.len())?;
    }
    for relation in model.relations() {
        let tuples = enforcer.get_named_grouping_policy(relation.name())?;
        writeln!(out, "{}: {} tuples", relation.name(), tuples.len())?;
    }
    Ok(())
}

fn enforce_to(enforcer: &Enforcer, fields: &[String], explain: bool, out: &mut impl Write) -> Result<()> {
    if explain {
        let decision = enforcer.explain(fields)?;
        serde_json::to_writer_pretty(&mut *out, &decision)?;
        writeln!(out)?;
    } else {
        let allowed = enforcer.enforce(fields)?;
        writeln!(out, "{}", if allowed { "allow" } else { "deny" })?;
    }
    Ok(())
}

fn list_to(enforcer: &Enforcer, grouping: bool, ptype: Option<&str>, out: &mut impl Write) -> Result<()> {
    let rules = if grouping {
        enforcer.get_named_grouping_policy(ptype.unwrap_or(DEFAULT_RELATION))?
    } else {
        enforcer.get_named_policy(ptype.unwrap_or(DEFAULT_POLICY))?
    };
    for rule in rules {
        writeln!(out, "{rule}")?;
    }
    Ok(())
}

fn roles_to(
    enforcer: &Enforcer,
    user: &str,
    domain: Option<&str>,
    implicit: bool,
    out: &mut impl Write,
) -> Result<()> {
    let roles = if implicit {
        enforcer.get_implicit_roles_for_user(user, domain)?
    } else {
        enforcer.get_roles_for_user(user, domain)?
    };
    for role in roles {
        writeln!(out, "{role}")?;
    }
    Ok(())
}
