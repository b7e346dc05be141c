//! Role helpers over the default `g` relation
//!
//! Thin conveniences on top of the grouping operations. The `domain` argument
//! must be present exactly when `g` is declared with a domain field.

use crate::enforcer::{domain_key, Enforcer, EngineState, DEFAULT_POLICY, DEFAULT_RELATION};
use std::collections::BTreeSet;
use tessera_core::{Result, Rule, TesseraError};
use tessera_model::EnforceContext;

fn grouping_tuple<'a>(user: &'a str, role: &'a str, domain: Option<&'a str>) -> Vec<&'a str> {
    let mut tuple = vec![user, role];
    tuple.extend(domain);
    tuple
}

impl Enforcer {
    /// Assign `role` to `user`
    pub fn add_role_for_user(&self, user: &str, role: &str, domain: Option<&str>) -> Result<bool> {
        self.add_grouping_policy(&grouping_tuple(user, role, domain))
    }

    /// Revoke the direct assignment of `role` to `user`
    pub fn delete_role_for_user(&self, user: &str, role: &str, domain: Option<&str>) -> Result<bool> {
        self.remove_grouping_policy(&grouping_tuple(user, role, domain))
    }

    /// Whether `user` directly holds `role`
    pub fn has_role_for_user(&self, user: &str, role: &str, domain: Option<&str>) -> Result<bool> {
        self.has_grouping_policy(&grouping_tuple(user, role, domain))
    }

    /// Roles assigned directly to `user`, sorted
    pub fn get_roles_for_user(&self, user: &str, domain: Option<&str>) -> Result<Vec<String>> {
        let (idx, def) = self.relation(DEFAULT_RELATION)?;
        let domain = domain_key(def, domain)?;
        Ok(self.state.read().graphs[idx].parents(user, domain))
    }

    /// Every role `user` reaches through `g`, sorted, excluding `user`
    pub fn get_implicit_roles_for_user(&self, user: &str, domain: Option<&str>) -> Result<Vec<String>> {
        let (idx, def) = self.relation(DEFAULT_RELATION)?;
        let domain = domain_key(def, domain)?;
        let ancestors = self.state.read().graphs[idx].ancestors(user, domain);
        let mut roles: Vec<String> = ancestors.into_iter().filter(|r| r != user).collect();
        roles.sort_unstable();
        Ok(roles)
    }

    /// Users (or roles) holding `role` directly, sorted
    pub fn get_users_for_role(&self, role: &str, domain: Option<&str>) -> Result<Vec<String>> {
        let (idx, def) = self.relation(DEFAULT_RELATION)?;
        let domain = domain_key(def, domain)?;
        Ok(self.state.read().graphs[idx].children(role, domain))
    }

    /// Rules of policy `p` whose subject is `user` itself
    ///
    /// With a domain, the rule's domain field must equal `domain`.
    pub fn get_permissions_for_user(&self, user: &str, domain: Option<&str>) -> Result<Vec<Rule>> {
        let (idx, def) = self.relation(DEFAULT_RELATION)?;
        domain_key(def, domain)?;
        let filter = self.domain_filter(idx, domain)?;
        let subjects = BTreeSet::from([user.to_string()]);
        Ok(permissions_for(&self.state.read(), &subjects, filter))
    }

    /// Rules of policy `p` whose subject is `user` or any role it reaches
    pub fn get_implicit_permissions_for_user(&self, user: &str, domain: Option<&str>) -> Result<Vec<Rule>> {
        let (idx, def) = self.relation(DEFAULT_RELATION)?;
        let key = domain_key(def, domain)?;
        let filter = self.domain_filter(idx, domain)?;
        let state = self.state.read();
        let subjects: BTreeSet<String> = state.graphs[idx].ancestors(user, key).into_iter().collect();
        Ok(permissions_for(&state, &subjects, filter))
    }

    /// Position of the domain in `p` rules paired with the wanted value
    ///
    /// The position is the policy field the default matcher binds to the
    /// domain of `g`; a field named `dom` is used when the matcher binds none.
    fn domain_filter<'d>(&self, relation: usize, domain: Option<&'d str>) -> Result<Option<(usize, &'d str)>> {
        let Some(domain) = domain else {
            return Ok(None);
        };
        let ctx = EnforceContext::default();
        let field = self
            .model()
            .matcher(&ctx.matcher)
            .and_then(|m| m.expr().policy_domain_field(relation))
            .or_else(|| self.model().policy(DEFAULT_POLICY).and_then(|p| p.index_of("dom")))
            .ok_or_else(|| {
                TesseraError::validation(format!(
                    "policy `{DEFAULT_POLICY}` has no field bound to the domain of `{DEFAULT_RELATION}`"
                ))
            })?;
        Ok(Some((field, domain)))
    }
}

fn permissions_for(state: &EngineState, subjects: &BTreeSet<String>, domain: Option<(usize, &str)>) -> Vec<Rule> {
    state
        .store
        .policies(DEFAULT_POLICY)
        .filter(|rule| rule.first().is_some_and(|s| subjects.contains(s)))
        .filter(|rule| domain.map_or(true, |(field, d)| rule.get(field).is_some_and(|v| v == d)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::Enforcer;
    use assert_matches::assert_matches;
    use tessera_core::{Rule, TesseraError};
    use tessera_model::Model;

    const DOMAIN_MODEL: &str = "[request_definition]\nr = sub, dom, obj, act\n[policy_definition]\np = sub, dom, obj, act\n[role_definition]\ng = _, _, _\n[policy_effect]\ne = some(where (p.eft == allow))\n[matchers]\nm = g(r.sub, p.sub, r.dom) && r.dom == p.dom && r.obj == p.obj && r.act == p.act\n";

    const FLAT_MODEL: &str = "[request_definition]\nr = sub, obj, act\n[policy_definition]\np = sub, obj, act\n[role_definition]\ng = _, _\n[policy_effect]\ne = some(where (p.eft == allow))\n[matchers]\nm = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act\n";

    fn domain_enforcer() -> Enforcer {
        let e = Enforcer::new(Model::from_text(DOMAIN_MODEL).unwrap());
        e.add_role_for_user("bolek", "role:ADMIN", Some("d1")).unwrap();
        e.add_role_for_user("role:ADMIN", "role:DATA", Some("d1")).unwrap();
        e.add_role_for_user("role:DATA", "role:PUBLIC", Some("d1")).unwrap();
        e.add_role_for_user("adam", "role:DATA", Some("d2")).unwrap();
        e
    }

    #[test]
    fn test_direct_and_implicit_roles() {
        let e = domain_enforcer();
        assert_eq!(e.get_roles_for_user("bolek", Some("d1")).unwrap(), vec!["role:ADMIN"]);
        assert_eq!(
            e.get_implicit_roles_for_user("bolek", Some("d1")).unwrap(),
            vec!["role:ADMIN", "role:DATA", "role:PUBLIC"]
        );
        assert!(e.get_roles_for_user("bolek", Some("d2")).unwrap().is_empty());
        assert_eq!(
            e.get_users_for_role("role:DATA", Some("d1")).unwrap(),
            vec!["role:ADMIN"]
        );
    }

    #[test]
    fn test_has_and_delete_role() {
        let e = domain_enforcer();
        assert!(e.has_role_for_user("bolek", "role:ADMIN", Some("d1")).unwrap());
        assert!(!e.has_role_for_user("bolek", "role:DATA", Some("d1")).unwrap());
        assert!(e.delete_role_for_user("bolek", "role:ADMIN", Some("d1")).unwrap());
        assert!(!e.delete_role_for_user("bolek", "role:ADMIN", Some("d1")).unwrap());
        assert!(e.get_implicit_roles_for_user("bolek", Some("d1")).unwrap().is_empty());
    }

    #[test]
    fn test_domain_argument_must_fit_relation() {
        let e = domain_enforcer();
        assert_matches!(
            e.get_roles_for_user("bolek", None),
            Err(TesseraError::Validation { .. })
        );
        let flat = Enforcer::new(Model::from_text(FLAT_MODEL).unwrap());
        assert!(flat.add_role_for_user("alice", "admin", None).unwrap());
        assert_matches!(
            flat.add_role_for_user("alice", "admin", Some("d1")),
            Err(TesseraError::Validation { .. })
        );
        assert_eq!(flat.get_roles_for_user("alice", None).unwrap(), vec!["admin"]);
    }

    #[test]
    fn test_permissions_follow_implicit_roles() {
        let e = domain_enforcer();
        e.add_policy(&["role:PUBLIC", "d1", "m1", "predict"]).unwrap();
        e.add_policy(&["role:DATA", "d1", "s1", "read"]).unwrap();
        e.add_policy(&["role:DATA", "d2", "s1", "write"]).unwrap();
        e.add_policy(&["role:ENGINES", "d1", "e1", "read"]).unwrap();

        let perms = e.get_implicit_permissions_for_user("bolek", Some("d1")).unwrap();
        assert_eq!(
            perms,
            vec![
                Rule::from(["role:PUBLIC", "d1", "m1", "predict"]),
                Rule::from(["role:DATA", "d1", "s1", "read"]),
            ]
        );
        assert_eq!(
            e.get_implicit_permissions_for_user("adam", Some("d2")).unwrap(),
            vec![Rule::from(["role:DATA", "d2", "s1", "write"])]
        );
        assert!(e.get_permissions_for_user("bolek", Some("d1")).unwrap().is_empty());

        e.add_policy(&["bolek", "d1", "m1", "delete"]).unwrap();
        assert_eq!(
            e.get_permissions_for_user("bolek", Some("d1")).unwrap(),
            vec![Rule::from(["bolek", "d1", "m1", "delete"])]
        );
    }

    #[test]
    fn test_permissions_match_the_domain_field_only() {
        let e = domain_enforcer();
        // object named like the queried tenant
        e.add_policy(&["alice", "d2", "d1", "read"]).unwrap();
        e.add_policy(&["role:DATA", "d2", "d1", "write"]).unwrap();
        e.add_role_for_user("alice", "role:DATA", Some("d1")).unwrap();

        assert!(!e.enforce(&["alice", "d1", "d1", "read"]).unwrap());
        assert!(e.get_permissions_for_user("alice", Some("d1")).unwrap().is_empty());
        assert!(e.get_implicit_permissions_for_user("alice", Some("d1")).unwrap().is_empty());
        assert_eq!(
            e.get_permissions_for_user("alice", Some("d2")).unwrap(),
            vec![Rule::from(["alice", "d2", "d1", "read"])]
        );
    }
}
