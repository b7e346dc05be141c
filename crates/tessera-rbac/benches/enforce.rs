//! Enforcement throughput over a generated tenant
//!
//! Builds the role hierarchy, then adds generated objects with per-role rules
//! and generated users with occasional overrides. Generation is deterministic
//! so runs are comparable.

#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera_model::Model;
use tessera_rbac::Enforcer;

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

const ROLES: [&str; 5] = ["role:ENGINES", "role:MODELS", "role:DATA", "role:ADMIN", "role:PUBLIC"];
const OBJECT_KINDS: [&str; 3] = ["e", "m", "s"];
const ACTIONS: [&str; 4] = ["read", "write", "predict", "delete"];
const EFFECTS: [&str; 2] = ["allow", "deny"];

fn build(users: usize, objects: usize) -> (Enforcer, Vec<String>) {
    let e = Enforcer::new(Model::from_text(MODEL).expect("model parses"));
    let d = "d1";
    for (child, parent) in [
        ("role:DATA", "role:PUBLIC"),
        ("role:ENGINES", "role:PUBLIC"),
        ("role:MODELS", "role:PUBLIC"),
        ("role:ADMIN", "role:DATA"),
        ("role:ADMIN", "role:ENGINES"),
        ("role:ADMIN", "role:MODELS"),
    ] {
        e.add_grouping_policy(&[child, parent, d]).expect("edge");
    }

    let mut rng = ChaCha8Rng::seed_from_u64(0x2545_f491);
    for i in 0..objects {
        let kind = rng.gen_range(0..OBJECT_KINDS.len());
        let obj = format!("{}{i}", OBJECT_KINDS[kind]);
        let count = rng.gen_range(0..ACTIONS.len());
        for &act in ACTIONS.choose_multiple(&mut rng, count) {
            let eft = *EFFECTS.choose(&mut rng).expect("effects");
            e.add_policy(&[ROLES[kind], d, obj.as_str(), act, eft]).expect("rule");
        }
    }

    let mut names = Vec::with_capacity(users);
    for i in 0..users {
        let user = format!("user{i}");
        let role = *ROLES.choose(&mut rng).expect("roles");
        e.add_role_for_user(&user, role, Some(d)).expect("role");
        if rng.gen_ratio(1, 10) {
            let obj = format!(
                "{}{}",
                OBJECT_KINDS.choose(&mut rng).expect("kinds"),
                rng.gen_range(0..objects.max(1))
            );
            let act = *ACTIONS.choose(&mut rng).expect("actions");
            let eft = *EFFECTS.choose(&mut rng).expect("effects");
            e.add_policy(&[user.as_str(), d, obj.as_str(), act, eft]).expect("override");
        }
        names.push(user);
    }
    (e, names)
}

fn bench_enforce(c: &mut Criterion) {
    let mut group = c.benchmark_group("enforce");
    group.throughput(Throughput::Elements(1));

    for (users, objects) in [(100, 100), (1_000, 1_000), (5_000, 2_000)] {
        let (e, names) = build(users, objects);
        let mut rng = ChaCha8Rng::seed_from_u64(0x9e37_79b9);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{users}u_{objects}o")),
            &(),
            |b, _| {
                b.iter(|| {
                    let user = names.choose(&mut rng).expect("users");
                    let obj = format!(
                        "{}{}",
                        OBJECT_KINDS.choose(&mut rng).expect("kinds"),
                        rng.gen_range(0..objects)
                    );
                    let act = *ACTIONS.choose(&mut rng).expect("actions");
                    black_box(e.enforce(&[user.as_str(), "d1", obj.as_str(), act]).expect("enforce"))
                })
            },
        );
    }
    group.finish();
}

fn bench_mutation(c: &mut Criterion) {
    c.bench_function("add_remove_role", |b| {
        let (e, _) = build(1_000, 500);
        b.iter(|| {
            e.add_role_for_user("bench-user", "role:ADMIN", Some("d1")).expect("add");
            e.delete_role_for_user("bench-user", "role:ADMIN", Some("d1")).expect("remove");
        })
    });
}

criterion_group!(benches, bench_enforce, bench_mutation);
criterion_main!(benches);
