//! End-to-end scenario: roles, role inheritance, object groups and per-user
//! overrides in one tenant, replayed against every storage backend.

use assert_matches::assert_matches;
use std::sync::Arc;
use std::thread;
use tessera_core::{EnforcerConfig, Record, StorageBackend, TesseraError};
use tessera_rbac::Enforcer;
use tessera_model::Model;
use tessera_store::{FileAdapter, MemoryAdapter};

const MODEL: &str = r#"[request_definition]
r = sub, dom, obj, act

[policy_definition]
p = sub, dom, obj, act, eft

[role_definition]
g = _, _, _
g2 = _, _, _

[policy_effect]
e = some(where (p.eft == allow)) && !some(where (p.eft == deny))

[matchers]
m = g(r.sub, p.sub, r.dom) && g2(r.obj, p.obj, r.dom) && r.dom == p.dom && r.act == p.act
"#;

fn model() -> Model {
    Model::from_text(MODEL).unwrap()
}

/// Populate the tenant through the public API
fn seed(e: &Enforcer, domain: &str) {
    // role permissions
    for (role, obj, act) in [
        ("role:DATA", "s1", "read"),
        ("role:DATA", "s1", "write"),
        ("role:ENGINES", "e1", "read"),
        ("role:ENGINES", "e1", "write"),
        ("role:PUBLIC", "m1", "predict"),
        ("role:ADMIN", "m1", "delete"),
        ("role:MODELS", "group:g1", "read"),
        ("role:MODELS", "group:g1", "write"),
    ] {
        assert!(e.add_policy(&[role, domain, obj, act, "allow"]).unwrap());
    }

    // role hierarchy
    for (child, parent) in [
        ("role:DATA", "role:PUBLIC"),
        ("role:ENGINES", "role:PUBLIC"),
        ("role:MODELS", "role:PUBLIC"),
        ("role:ADMIN", "role:DATA"),
        ("role:ADMIN", "role:ENGINES"),
        ("role:ADMIN", "role:MODELS"),
    ] {
        assert!(e.add_grouping_policy(&[child, parent, domain]).unwrap());
    }

    // object group membership
    for obj in ["m1", "m2", "m3"] {
        assert!(e.add_named_grouping_policy("g2", &[obj, "group:g1", domain]).unwrap());
    }

    // users
    for (user, role) in [
        ("john", "role:PUBLIC"),
        ("adam", "role:ENGINES"),
        ("matt", "role:MODELS"),
        ("bolek", "role:ADMIN"),
    ] {
        assert!(e.add_role_for_user(user, role, Some(domain)).unwrap());
    }

    // per-user overrides
    assert!(e.add_policy(&["john", domain, "m2", "read", "allow"]).unwrap());
    assert!(e.add_policy(&["matt", domain, "m3", "write", "deny"]).unwrap());
    assert!(e.add_policy(&["bolek", domain, "e1", "write", "deny"]).unwrap());
}

const EXPECTED: [(&str, &str, &str, bool); 15] = [
    ("john", "m1", "predict", true),
    ("john", "m1", "read", false),
    ("john", "m2", "read", true),
    ("adam", "m1", "predict", true),
    ("adam", "e1", "read", true),
    ("adam", "e1", "write", true),
    ("adam", "e2", "read", false),
    ("matt", "m1", "write", true),
    ("matt", "m2", "write", true),
    ("matt", "m3", "write", false),
    ("bolek", "m1", "predict", true),
    ("bolek", "m1", "write", true),
    ("bolek", "e1", "write", false),
    ("bolek", "m1", "delete", true),
    ("bolek", "s1", "write", true),
];

fn assert_expected(e: &Enforcer, domain: &str) {
    for (sub, obj, act, want) in EXPECTED {
        assert_eq!(
            e.enforce(&[sub, domain, obj, act]).unwrap(),
            want,
            "{sub}, {domain}, {obj}, {act}"
        );
    }
}

#[test]
fn test_scenario_in_memory() {
    let e = Enforcer::new(model());
    seed(&e, "d1");
    assert_expected(&e, "d1");
}

#[test]
fn test_scenario_persists_through_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rbac_policy.csv");

    let e = Enforcer::with_adapter(model(), FileAdapter::new(&path)).unwrap();
    seed(&e, "d1");
    assert_expected(&e, "d1");

    let reopened = Enforcer::with_adapter(model(), FileAdapter::new(&path)).unwrap();
    assert_expected(&reopened, "d1");
    assert_eq!(reopened.get_policy().unwrap().len(), 11);
    assert_eq!(reopened.get_grouping_policy().unwrap().len(), 10);
    assert_eq!(reopened.get_named_grouping_policy("g2").unwrap().len(), 3);
}

#[test]
fn test_scenario_from_config_with_json_backend() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EnforcerConfig::with_model_text(MODEL);
    config.storage.backend = StorageBackend::Json;
    config.storage.path = Some(dir.path().join("policy.json"));

    let e = Enforcer::from_config(&config).unwrap();
    seed(&e, "d1");

    let reopened = Enforcer::from_config(&config).unwrap();
    assert_expected(&reopened, "d1");
    assert!(dir.path().join("policy.json").exists());
}

#[test]
fn test_tenants_are_isolated() {
    let e = Enforcer::new(model());
    seed(&e, "d1");
    for (sub, obj, act, _) in EXPECTED {
        assert!(!e.enforce(&[sub, "d2", obj, act]).unwrap());
    }
    // matching relations in a second tenant do not leak back into the first
    e.add_role_for_user("john", "role:ADMIN", Some("d2")).unwrap();
    assert!(!e.enforce(&["john", "d1", "m1", "delete"]).unwrap());
}

#[test]
fn test_removing_an_override_restores_inherited_access() {
    let e = Enforcer::new(model());
    seed(&e, "d1");
    assert!(e.remove_policy(&["matt", "d1", "m3", "write", "deny"]).unwrap());
    assert!(e.enforce(&["matt", "d1", "m3", "write"]).unwrap());

    assert!(e.remove_named_grouping_policy("g2", &["m3", "group:g1", "d1"]).unwrap());
    assert!(!e.enforce(&["matt", "d1", "m3", "write"]).unwrap());
}

#[test]
fn test_revoking_a_role_edge_cuts_inheritance() {
    let e = Enforcer::new(model());
    seed(&e, "d1");
    assert!(e.remove_grouping_policy(&["role:ADMIN", "role:DATA", "d1"]).unwrap());
    assert!(!e.enforce(&["bolek", "d1", "s1", "write"]).unwrap());
    // other branches of the hierarchy are intact
    assert!(e.enforce(&["bolek", "d1", "m1", "write"]).unwrap());
}

#[test]
fn test_repeated_mutations_are_idempotent() {
    let e = Enforcer::new(model());
    seed(&e, "d1");
    assert!(!e.add_policy(&["role:DATA", "d1", "s1", "read", "allow"]).unwrap());
    assert!(!e.add_grouping_policy(&["john", "role:PUBLIC", "d1"]).unwrap());
    assert!(!e.remove_policy(&["nobody", "d1", "s1", "read", "allow"]).unwrap());
    assert_expected(&e, "d1");
}

#[test]
fn test_explain_lists_allow_and_deny_matches() {
    let e = Enforcer::new(model());
    seed(&e, "d1");
    let decision = e.explain(&["bolek", "d1", "e1", "write"]).unwrap();
    assert!(!decision.allowed);
    let subjects: Vec<&str> = decision.matched.iter().map(|m| m.rule[0].as_str()).collect();
    assert_eq!(subjects, vec!["role:ENGINES", "bolek"]);
}

#[test]
fn test_implicit_roles_and_permissions() {
    let e = Enforcer::new(model());
    seed(&e, "d1");
    assert_eq!(
        e.get_implicit_roles_for_user("bolek", Some("d1")).unwrap(),
        vec!["role:ADMIN", "role:DATA", "role:ENGINES", "role:MODELS", "role:PUBLIC"]
    );
    assert_eq!(e.get_permissions_for_user("john", Some("d1")).unwrap().len(), 1);
    assert_eq!(e.get_implicit_permissions_for_user("john", Some("d1")).unwrap().len(), 2);
    assert!(e.reachable("g2", "m2", "group:g1", Some("d1")).unwrap());
}

#[test]
fn test_storage_failure_leaves_decisions_unchanged() {
    let adapter = Arc::new(MemoryAdapter::new());
    let e = Enforcer::with_adapter(model(), adapter.clone()).unwrap();
    seed(&e, "d1");

    adapter.fail_writes(true);
    assert_matches!(
        e.add_role_for_user("john", "role:ADMIN", Some("d1")),
        Err(TesseraError::Storage { .. })
    );
    assert_matches!(
        e.remove_policy(&["bolek", "d1", "e1", "write", "deny"]),
        Err(TesseraError::Storage { .. })
    );
    assert_expected(&e, "d1");
    assert!(!adapter.snapshot().records.contains(&Record::new("g", ["john", "role:ADMIN", "d1"])));
}

#[test]
fn test_concurrent_enforcement_during_mutation() {
    let e = Arc::new(Enforcer::new(model()));
    seed(&e, "d1");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let e = Arc::clone(&e);
            thread::spawn(move || {
                for _ in 0..200 {
                    // untouched by the writer below
                    assert!(e.enforce(&["bolek", "d1", "m1", "delete"]).unwrap());
                    assert!(!e.enforce(&["john", "d1", "m1", "read"]).unwrap());
                }
            })
        })
        .collect();

    let writer = {
        let e = Arc::clone(&e);
        thread::spawn(move || {
            for i in 0..200 {
                let user = format!("user{i}");
                e.add_role_for_user(&user, "role:PUBLIC", Some("d1")).unwrap();
                assert!(e.enforce(&[user.as_str(), "d1", "m1", "predict"]).unwrap());
            }
        })
    };

    for handle in readers {
        handle.join().unwrap();
    }
    writer.join().unwrap();
    assert_eq!(e.get_users_for_role("role:PUBLIC", Some("d1")).unwrap().len(), 204);
}
