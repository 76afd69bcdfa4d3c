//! Role hierarchy tests: cycle rejection and expansion closure

use proptest::prelude::*;
use std::collections::BTreeSet;
use warden_authz::hierarchy::{InMemoryRoleStore, RoleGraph, RoleStore};
use warden_authz::types::{RoleEdge, RoleId, Status};
use warden_authz::{AuditConfig, AuthzError, EngineConfig, PermissionResolver};

const ROLES: RoleId = 8;

fn edge_strategy() -> impl Strategy<Value = Vec<(RoleId, RoleId, bool)>> {
    prop::collection::vec((1..=ROLES, 1..=ROLES, any::<bool>()), 0..32)
}

fn name(id: RoleId) -> String {
    format!("role-{}", id)
}

/// Kahn's algorithm over the raw edge list
fn is_acyclic(edges: &[RoleEdge]) -> bool {
    let mut remaining = edges.to_vec();
    loop {
        let sources: BTreeSet<RoleId> = remaining
            .iter()
            .map(|e| e.parent)
            .filter(|p| !remaining.iter().any(|e| e.child == *p))
            .collect();
        if sources.is_empty() {
            return remaining.is_empty();
        }
        remaining.retain(|e| !sources.contains(&e.parent));
    }
}

// ============================================================================
// GRAPH PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn prop_graph_never_contains_a_cycle(edges in edge_strategy()) {
        let mut graph = RoleGraph::new();

        for (parent, child, inherits) in edges {
            let before = graph.edges();
            let edge = RoleEdge { parent, child, inherits_permissions: inherits };

            if let Err(cycle) = graph.add_edge(edge, name) {
                // Rejection leaves the graph exactly as it was
                prop_assert_eq!(graph.edges(), before);
                prop_assert!(cycle.path.len() >= 2);
                prop_assert_eq!(cycle.path.first(), cycle.path.last());
            }

            prop_assert!(is_acyclic(&graph.edges()));
        }
    }

    #[test]
    fn prop_expand_is_closed_and_idempotent(edges in edge_strategy()) {
        let mut graph = RoleGraph::new();
        for (parent, child, inherits) in edges {
            let _ = graph.add_edge(RoleEdge { parent, child, inherits_permissions: inherits }, name);
        }

        for role in 1..=ROLES {
            let expanded = graph.expand(role);
            prop_assert!(expanded.contains(&role));

            let again = graph.expand_all(expanded.iter().copied(), |_| true);
            prop_assert_eq!(&again, &expanded);

            // Every inheriting parent of an expanded role is itself expanded
            for edge in graph.edges() {
                if edge.inherits_permissions && expanded.contains(&edge.child) {
                    prop_assert!(expanded.contains(&edge.parent));
                }
            }
        }
    }

    #[test]
    fn prop_store_rejects_cycles_without_mutation(edges in edge_strategy()) {
        tokio_test::block_on(async {
            let store = InMemoryRoleStore::new();
            for id in 1..=ROLES {
                let role = store.create_role(&name(id)).await.unwrap();
                assert_eq!(role.id, id);
            }

            for (parent, child, inherits) in edges {
                let before = store.edges().await.unwrap();
                let edge = RoleEdge { parent, child, inherits_permissions: inherits };

                match store.add_edge(edge).await {
                    Ok(()) => assert!(store.edges().await.unwrap().contains(&edge)),
                    Err(AuthzError::Cycle(_)) => {
                        assert_eq!(store.edges().await.unwrap(), before);
                    }
                    Err(AuthzError::Conflict(_)) => {
                        // Only a repeated (parent, child) pair is a conflict
                        assert!(before.iter().any(|e| e.parent == parent && e.child == child));
                        assert_eq!(store.edges().await.unwrap(), before);
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        });
    }
}

// ============================================================================
// RESOLVER-LEVEL HIERARCHY
// ============================================================================

async fn chain_resolver() -> PermissionResolver {
    let resolver = PermissionResolver::in_memory(EngineConfig::default(), AuditConfig::default());
    for role in ["guest", "member", "moderator", "admin"] {
        resolver.create_role(role).await.unwrap();
    }
    resolver.add_role_edge("guest", "member", true).await.unwrap();
    resolver.add_role_edge("member", "moderator", true).await.unwrap();
    resolver.add_role_edge("moderator", "admin", true).await.unwrap();
    resolver.register_user(1, Status::Active).await.unwrap();
    resolver.assign_role(1, "admin").await.unwrap();
    resolver
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_transitive_expansion() {
    let resolver = chain_resolver().await;
    assert_eq!(
        resolver.expand_roles(1).await.unwrap(),
        set(&["admin", "guest", "member", "moderator"])
    );
}

#[tokio::test]
async fn test_cycle_reports_full_path() {
    let resolver = chain_resolver().await;

    let err = resolver.add_role_edge("admin", "guest", true).await.unwrap_err();
    match err {
        AuthzError::Cycle(cycle) => {
            assert_eq!(
                cycle.path,
                vec!["guest", "member", "moderator", "admin", "guest"]
            );
        }
        other => panic!("expected cycle error, got {other:?}"),
    }

    // Hierarchy is unchanged
    assert_eq!(
        resolver.expand_roles(1).await.unwrap(),
        set(&["admin", "guest", "member", "moderator"])
    );
}

#[tokio::test]
async fn test_self_edge_is_a_cycle() {
    let resolver = chain_resolver().await;
    let err = resolver.add_role_edge("member", "member", true).await.unwrap_err();
    assert!(matches!(err, AuthzError::Cycle(_)));
    assert_eq!(err.status_class(), 409);
}

#[tokio::test]
async fn test_non_inheriting_edge_still_blocks_cycles() {
    let resolver = chain_resolver().await;
    resolver.create_role("observer").await.unwrap();
    resolver.add_role_edge("observer", "guest", false).await.unwrap();

    let err = resolver.add_role_edge("admin", "observer", true).await.unwrap_err();
    assert!(matches!(err, AuthzError::Cycle(_)));

    // The non-inheriting parent is not part of the expansion
    assert!(!resolver.expand_roles(1).await.unwrap().contains("observer"));
}

#[tokio::test]
async fn test_removing_edge_shrinks_expansion() {
    let resolver = chain_resolver().await;

    assert!(resolver.remove_role_edge("member", "moderator").await.unwrap());
    assert!(!resolver.remove_role_edge("member", "moderator").await.unwrap());

    assert_eq!(
        resolver.expand_roles(1).await.unwrap(),
        set(&["admin", "moderator"])
    );

    // With the link gone the reverse edge is legal
    resolver.add_role_edge("moderator", "member", true).await.unwrap();
}

#[tokio::test]
async fn test_inactive_role_blocks_traversal() {
    let resolver = chain_resolver().await;
    resolver.deactivate_role("moderator").await.unwrap();

    assert_eq!(resolver.expand_roles(1).await.unwrap(), set(&["admin"]));
}

#[tokio::test]
async fn test_unknown_role_names_are_not_found() {
    let resolver = chain_resolver().await;

    let err = resolver.add_role_edge("ghost", "admin", true).await.unwrap_err();
    assert!(matches!(err, AuthzError::NotFound(_)));

    let err = resolver.assign_role(1, "ghost").await.unwrap_err();
    assert!(matches!(err, AuthzError::NotFound(_)));
}

#[tokio::test]
async fn test_duplicate_role_name_conflicts() {
    let resolver = chain_resolver().await;
    let err = resolver.create_role("admin").await.unwrap_err();
    assert!(matches!(err, AuthzError::Conflict(_)));
}
