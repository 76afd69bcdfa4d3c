//! Decision benchmarks
//!
//! Measures the simple-grant fast path, the extended-grant path with
//! condition evaluation, and role expansion depth.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use warden_authz::attributes::AttributeType;
use warden_authz::engine::OverflowPolicy;
use warden_authz::types::Status;
use warden_authz::{
    AuditConfig, Comparator, Condition, ConditionSet, DecisionRequest, EngineConfig,
    ExtendedGrantSpec, Operand, PermissionResolver, Scope,
};

fn bench_audit_config() -> AuditConfig {
    AuditConfig {
        capacity: 1024,
        overflow: OverflowPolicy::DropOldest,
        ..Default::default()
    }
}

/// Chain of `depth` roles, each inheriting the previous one, with the read
/// grant on the root and the user assigned to the leaf
async fn role_chain(depth: usize) -> PermissionResolver {
    let resolver = PermissionResolver::in_memory(
        EngineConfig {
            enable_metrics: false,
            ..Default::default()
        },
        bench_audit_config(),
    );

    for i in 0..depth {
        resolver.create_role(&format!("role-{}", i)).await.unwrap();
        if i > 0 {
            resolver
                .add_role_edge(&format!("role-{}", i - 1), &format!("role-{}", i), true)
                .await
                .unwrap();
        }
    }

    resolver.register_resource("doc", None).await.unwrap();
    resolver.register_action("read").await.unwrap();
    resolver.add_simple_grant(0, "role-0", "doc", "read").await.unwrap();

    resolver.register_user(1, Status::Active).await.unwrap();
    resolver
        .assign_role(1, &format!("role-{}", depth - 1))
        .await
        .unwrap();

    resolver
}

/// `count` extended grants on one target; only the lowest priority passes
async fn extended_grants(count: usize) -> PermissionResolver {
    let resolver = PermissionResolver::in_memory(
        EngineConfig {
            enable_metrics: false,
            ..Default::default()
        },
        bench_audit_config(),
    );

    resolver.create_role("manager").await.unwrap();
    resolver.register_resource("salary", None).await.unwrap();
    resolver.register_action("view").await.unwrap();
    resolver
        .set_resource_attribute("salary", "department", "HR", AttributeType::String)
        .await
        .unwrap();
    resolver.register_user(1, Status::Active).await.unwrap();
    resolver.assign_role(1, "manager").await.unwrap();
    resolver
        .set_user_attribute(1, "department", "HR", AttributeType::String)
        .await
        .unwrap();
    resolver
        .set_user_attribute(1, "level", "3", AttributeType::Number)
        .await
        .unwrap();

    for i in 0..count {
        let mut clauses = vec![Condition::new(
            Scope::User,
            "department",
            Comparator::Eq,
            Operand::attribute(Scope::Resource, "department"),
        )];
        if i > 0 {
            clauses.push(Condition::new(
                Scope::User,
                "level",
                Comparator::Gte,
                Operand::literal(10.0),
            ));
        }

        resolver
            .add_extended_grant(
                0,
                ExtendedGrantSpec {
                    role: "manager".to_string(),
                    resource: "salary".to_string(),
                    action: "view".to_string(),
                    conditions: Some(ConditionSet::new(clauses)),
                    priority: i as i32,
                },
            )
            .await
            .unwrap();
    }

    resolver
}

fn bench_simple_grant(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("simple_grant");

    for depth in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("role_depth", depth), &depth, |b, &depth| {
            let resolver = rt.block_on(role_chain(depth));
            let request = DecisionRequest::new(1, "doc", "read");

            b.to_async(&rt).iter(|| async {
                let decision = resolver.decide(black_box(&request)).await.unwrap();
                black_box(decision);
            });
        });
    }

    group.finish();
}

fn bench_extended_grants(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("extended_grants");

    for count in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::new("candidates", count), &count, |b, &count| {
            let resolver = rt.block_on(extended_grants(count));
            let request = DecisionRequest::new(1, "salary", "view");

            b.to_async(&rt).iter(|| async {
                let decision = resolver.decide(black_box(&request)).await.unwrap();
                black_box(decision);
            });
        });
    }

    group.finish();
}

fn bench_expand_roles(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let resolver = rt.block_on(role_chain(32));

    c.bench_function("expand_roles_depth_32", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(resolver.expand_roles(black_box(1)).await.unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_simple_grant,
    bench_extended_grants,
    bench_expand_roles
);
criterion_main!(benches);
