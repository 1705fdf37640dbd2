//! Role graph storage
//!
//! The store is the durable home of roles, permissions, inheritance edges,
//! wildcard edges and principal assignments. The engine only ever reads and
//! writes through [`RoleGraphStore`]; every call is a potential await point.

use crate::error::Result;
use crate::types::{
    NewPermission, NewRole, Permission, PermissionId, PrincipalId, Role, RoleId,
};
use async_trait::async_trait;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRoleGraphStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRoleGraphStore;

/// Role graph store trait
///
/// Lookups by id, slug or name return [`RbacError::NotFound`] when the entity
/// is absent. List operations return an empty vector instead.
///
/// [`RbacError::NotFound`]: crate::error::RbacError::NotFound
#[async_trait]
pub trait RoleGraphStore: Send + Sync {
    // Roles

    /// Get a role by id
    async fn role(&self, id: RoleId) -> Result<Role>;

    /// Get a role by slug
    async fn role_by_slug(&self, slug: &str) -> Result<Role>;

    /// All roles whose slug starts with `prefix` (case-sensitive)
    async fn roles_with_prefix(&self, prefix: &str) -> Result<Vec<Role>>;

    /// Store a new role
    async fn insert_role(&self, role: NewRole) -> Result<Role>;

    /// Update a role's display attributes; the slug is immutable
    async fn update_role(&self, role: &Role) -> Result<Role>;

    /// Delete a role and every edge or assignment that references it
    async fn delete_role(&self, id: RoleId) -> Result<()>;

    // Permissions

    /// Get a permission by id
    async fn permission(&self, id: PermissionId) -> Result<Permission>;

    /// Get a permission by name
    async fn permission_by_name(&self, name: &str) -> Result<Permission>;

    /// Store a new permission
    async fn insert_permission(&self, permission: NewPermission) -> Result<Permission>;

    /// Update a permission's description; the name is immutable
    async fn update_permission(&self, permission: &Permission) -> Result<Permission>;

    /// Delete a permission and every assignment that references it
    async fn delete_permission(&self, id: PermissionId) -> Result<()>;

    // Inheritance edges

    /// Roles the given role inherits through explicit edges
    async fn child_roles(&self, parent: RoleId) -> Result<Vec<Role>>;

    /// Roles that inherit the given role through explicit edges
    async fn parent_roles(&self, child: RoleId) -> Result<Vec<Role>>;

    /// Add a `(parent, child)` edge; returns false if it already existed
    async fn insert_inheritance(&self, parent: RoleId, child: RoleId) -> Result<bool>;

    /// Remove a `(parent, child)` edge; returns false if it was absent
    async fn delete_inheritance(&self, parent: RoleId, child: RoleId) -> Result<bool>;

    // Wildcard edges

    /// Wildcard patterns attached to the role
    async fn wildcard_patterns(&self, parent: RoleId) -> Result<Vec<String>>;

    /// Add a `(parent, pattern)` edge; returns false if it already existed
    async fn insert_wildcard(&self, parent: RoleId, pattern: &str) -> Result<bool>;

    /// Remove a `(parent, pattern)` edge; returns false if it was absent
    async fn delete_wildcard(&self, parent: RoleId, pattern: &str) -> Result<bool>;

    // Role permissions

    /// Permissions granted directly to the role
    async fn role_permissions(&self, role: RoleId) -> Result<Vec<Permission>>;

    /// Grant a permission to a role; returns false if already granted
    async fn insert_role_permission(&self, role: RoleId, permission: PermissionId) -> Result<bool>;

    /// Revoke a permission from a role; returns false if it was not granted
    async fn delete_role_permission(&self, role: RoleId, permission: PermissionId) -> Result<bool>;

    // Principal assignments

    /// Roles assigned directly to the principal
    async fn user_roles(&self, principal: &str) -> Result<Vec<Role>>;

    /// Principals holding the role directly
    async fn principals_with_role(&self, role: RoleId) -> Result<Vec<PrincipalId>>;

    /// Assign a role directly; fails with `AlreadyAssigned` on a duplicate
    async fn insert_user_role(&self, principal: &str, role: RoleId) -> Result<()>;

    /// Remove a direct assignment; returns false if it was absent
    async fn delete_user_role(&self, principal: &str, role: RoleId) -> Result<bool>;

    /// Atomically replace the principal's direct roles with exactly `roles`
    async fn replace_user_roles(&self, principal: &str, roles: &[RoleId]) -> Result<()>;

    /// Permissions granted directly to the principal
    async fn user_permissions(&self, principal: &str) -> Result<Vec<Permission>>;

    /// Grant a permission directly; returns false if already granted
    async fn insert_user_permission(&self, principal: &str, permission: PermissionId) -> Result<bool>;

    /// Revoke a direct permission; returns false if it was not granted
    async fn delete_user_permission(&self, principal: &str, permission: PermissionId) -> Result<bool>;
}
