//! Role graph resolution tests
//!
//! End-to-end checks of resolution, aggregation and the authorization
//! predicates through the public engine API.

use cretoai_rbac::store::InMemoryRoleGraphStore;
use cretoai_rbac::{NewPermission, NewRole, RbacEngine, RbacError};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn engine_with_roles(slugs: &[&str]) -> RbacEngine {
    init_tracing();
    let engine = RbacEngine::with_defaults(Arc::new(InMemoryRoleGraphStore::new()));
    for slug in slugs {
        engine.create_role(NewRole::new(*slug)).await.unwrap();
    }
    engine
}

// ============================================================================
// CLOSURE SHAPE
// ============================================================================

#[tokio::test]
async fn test_role_without_edges_resolves_to_itself() {
    let engine = engine_with_roles(&["viewer", "editor"]).await;

    let closure = engine.role_closure("viewer").await.unwrap();
    assert_eq!(closure.slugs(), vec!["viewer"]);
}

#[tokio::test]
async fn test_cycle_resolves_each_role_once() {
    let engine = engine_with_roles(&["a", "b"]).await;
    engine.assign_child("a", "b").await.unwrap();
    engine.assign_child("b", "a").await.unwrap();

    let closure = engine.role_closure("a").await.unwrap();
    assert_eq!(closure.len(), 2);
    assert_eq!(closure.slugs(), vec!["a", "b"]);

    let closure = engine.role_closure("b").await.unwrap();
    assert_eq!(closure.slugs(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_wildcard_is_a_prefix_match() {
    let engine = engine_with_roles(&["ops", "admin.billing", "admin.ops", "administrator"]).await;
    engine.assign_wildcard("ops", "admin.*").await.unwrap();

    let closure = engine.role_closure("ops").await.unwrap();
    assert!(closure.contains_slug("admin.billing"));
    assert!(closure.contains_slug("admin.ops"));
    assert!(!closure.contains_slug("administrator"));
}

#[tokio::test]
async fn test_dotted_role_inherits_its_segments() {
    let engine = engine_with_roles(&["admin", "billing", "admin.billing"]).await;

    let closure = engine.role_closure("admin.billing").await.unwrap();
    assert_eq!(closure.slugs(), vec!["admin", "admin.billing", "billing"]);
}

#[tokio::test]
async fn test_missing_segment_does_not_affect_resolution() {
    let engine = engine_with_roles(&["region", "us", "region.us.west"]).await;

    let closure = engine.role_closure("region.us.west").await.unwrap();
    assert_eq!(closure.slugs(), vec!["region", "region.us.west", "us"]);
}

// ============================================================================
// PREDICATES
// ============================================================================

#[tokio::test]
async fn test_has_all_roles_is_a_subset_check() {
    let engine = engine_with_roles(&["a", "b", "c"]).await;
    engine.assign_role("user:1", ["a"]).await.unwrap();

    assert!(!engine.has_all_roles("user:1", ["a", "b"]).await.unwrap());

    engine.assign_child("a", "b").await.unwrap();
    assert!(engine.has_all_roles("user:1", ["a", "b"]).await.unwrap());
    assert!(!engine.has_all_roles("user:1", ["a", "b", "c"]).await.unwrap());
    assert!(engine.has_any_role("user:1", ["c", "b"]).await.unwrap());
}

#[tokio::test]
async fn test_chain_grants_inherited_permission() {
    let engine = engine_with_roles(&["admin", "editor", "viewer"]).await;
    engine.create_permission(NewPermission::new("publish")).await.unwrap();

    engine.assign_child("admin", "editor").await.unwrap();
    engine.assign_child("editor", "viewer").await.unwrap();
    engine.grant_to_role("editor", "publish").await.unwrap();
    engine.assign_role("user:1", ["admin"]).await.unwrap();

    let roles = engine.effective_roles("user:1").await.unwrap();
    assert_eq!(roles.slugs(), vec!["admin", "editor", "viewer"]);
    assert!(engine.can("user:1", "publish").await.unwrap());

    // Inheritance is directional: a viewer does not publish
    engine.assign_role("user:2", ["viewer"]).await.unwrap();
    assert!(!engine.can("user:2", "publish").await.unwrap());
}

#[tokio::test]
async fn test_direct_permissions_merge_with_role_grants() {
    let engine = engine_with_roles(&["editor"]).await;
    engine.create_permission(NewPermission::new("publish")).await.unwrap();
    engine.create_permission(NewPermission::new("export")).await.unwrap();

    engine.grant_to_role("editor", "publish").await.unwrap();
    engine.assign_role("user:1", ["editor"]).await.unwrap();
    engine.give_permission("user:1", "export").await.unwrap();
    engine.give_permission("user:1", "publish").await.unwrap();

    let permissions = engine.effective_permissions("user:1").await.unwrap();
    assert_eq!(permissions.names(), vec!["export", "publish"]);
}

#[tokio::test]
async fn test_unknown_names_are_not_held() {
    let engine = engine_with_roles(&["editor"]).await;
    engine.assign_role("user:1", ["editor"]).await.unwrap();

    assert!(!engine.has_role("user:1", "does-not-exist").await.unwrap());
    assert!(!engine.can("user:1", "does-not-exist").await.unwrap());
}

// ============================================================================
// MUTATION ERRORS
// ============================================================================

#[tokio::test]
async fn test_duplicate_assignment_fails() {
    let engine = engine_with_roles(&["editor"]).await;

    engine.assign_role("user:1", ["editor"]).await.unwrap();
    let err = engine.assign_role("user:1", ["editor"]).await.unwrap_err();

    assert!(matches!(err, RbacError::AlreadyAssigned { .. }));
    assert_eq!(
        err.to_string(),
        "Role 'editor' is already assigned to principal 'user:1'"
    );
}

#[tokio::test]
async fn test_assign_child_with_unknown_name_fails() {
    let engine = engine_with_roles(&["editor"]).await;

    let err = engine.assign_child("editor", "nobody").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "role not found: nobody");
}

#[tokio::test]
async fn test_resolve_is_idempotent_and_grows_after_mutation() {
    let engine = engine_with_roles(&["a", "b", "c"]).await;
    engine.assign_child("a", "b").await.unwrap();
    engine.assign_role("user:1", ["a"]).await.unwrap();

    let first = engine.effective_roles("user:1").await.unwrap();
    let second = engine.effective_roles("user:1").await.unwrap();
    assert_eq!(first, second);

    engine.assign_child("b", "c").await.unwrap();
    let third = engine.effective_roles("user:1").await.unwrap();
    assert!(first.iter().all(|role| third.contains(role)));
    assert!(third.contains_slug("c"));
}
