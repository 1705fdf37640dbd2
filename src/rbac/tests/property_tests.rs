//! Property tests for resolution over random graphs

use cretoai_rbac::graph::RoleGraphResolver;
use cretoai_rbac::store::{InMemoryRoleGraphStore, RoleGraphStore};
use cretoai_rbac::{NewRole, Role, RoleSet};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

const ROLE_COUNT: usize = 12;

/// Build a store with `ROLE_COUNT` roles and the given edges (cycles allowed)
async fn build_graph(edges: &[(usize, usize)]) -> (Arc<InMemoryRoleGraphStore>, Vec<Role>) {
    let store = Arc::new(InMemoryRoleGraphStore::new());
    let mut roles = Vec::with_capacity(ROLE_COUNT);
    for i in 0..ROLE_COUNT {
        roles.push(store.insert_role(NewRole::new(format!("r{}", i))).await.unwrap());
    }
    for (parent, child) in edges {
        store
            .insert_inheritance(roles[*parent].id, roles[*child].id)
            .await
            .unwrap();
    }
    (store, roles)
}

/// Reference closure by plain recursion over the edge list
fn reachable(edges: &[(usize, usize)], start: usize, seen: &mut HashSet<usize>) {
    if !seen.insert(start) {
        return;
    }
    for (parent, child) in edges {
        if *parent == start {
            reachable(edges, *child, seen);
        }
    }
}

fn slugs(set: &RoleSet) -> BTreeSet<String> {
    set.iter().map(|role| role.slug.clone()).collect()
}

proptest! {
    #[test]
    fn test_resolution_matches_reachability(
        edges in prop::collection::vec((0..ROLE_COUNT, 0..ROLE_COUNT), 0..40),
        start in 0..ROLE_COUNT,
    ) {
        tokio_test::block_on(async {
            let (store, roles) = build_graph(&edges).await;
            let resolver = RoleGraphResolver::new(store);

            let resolved = resolver.resolve(vec![roles[start].clone()]).await.unwrap();

            let mut expected = HashSet::new();
            reachable(&edges, start, &mut expected);
            let expected: BTreeSet<String> =
                expected.into_iter().map(|i| format!("r{}", i)).collect();

            assert_eq!(slugs(&resolved), expected);
            assert_eq!(resolved.len(), expected.len());
        });
    }

    #[test]
    fn test_resolution_is_order_independent(
        edges in prop::collection::vec((0..ROLE_COUNT, 0..ROLE_COUNT), 0..40),
        starts in prop::collection::vec(0..ROLE_COUNT, 1..5),
    ) {
        tokio_test::block_on(async {
            let (store, roles) = build_graph(&edges).await;
            let resolver = RoleGraphResolver::new(store);

            let forward: Vec<Role> = starts.iter().map(|i| roles[*i].clone()).collect();
            let backward: Vec<Role> = forward.iter().rev().cloned().collect();

            let first = resolver.resolve(forward.clone()).await.unwrap();
            let second = resolver.resolve(backward).await.unwrap();
            let again = resolver.resolve(forward).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(first, again);
        });
    }
}
