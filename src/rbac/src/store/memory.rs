//! In-memory role graph store
//!
//! Keeps every table in memory behind a single `RwLock`. Unique constraints
//! and cascading deletes behave the way the relational schema does, which is
//! what makes this store a faithful stand-in in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RoleGraphStore;
use crate::error::{RbacError, Result};
use crate::types::{
    NewPermission, NewRole, Permission, PermissionId, PrincipalId, Role, RoleId,
};

#[derive(Default)]
struct Tables {
    next_role_id: RoleId,
    next_permission_id: PermissionId,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    /// (parent, child)
    role_inherits: BTreeSet<(RoleId, RoleId)>,
    /// (parent, pattern)
    role_wildcards: BTreeSet<(RoleId, String)>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    user_roles: BTreeSet<(PrincipalId, RoleId)>,
    user_permissions: BTreeSet<(PrincipalId, PermissionId)>,
}

impl Tables {
    fn role(&self, id: RoleId) -> Result<&Role> {
        self.roles.get(&id).ok_or_else(|| RbacError::role_not_found(id))
    }

    fn permission(&self, id: PermissionId) -> Result<&Permission> {
        self.permissions
            .get(&id)
            .ok_or_else(|| RbacError::permission_not_found(id))
    }

    fn roles_for(&self, ids: impl Iterator<Item = RoleId>) -> Vec<Role> {
        ids.filter_map(|id| self.roles.get(&id).cloned()).collect()
    }

    fn permissions_for(&self, ids: impl Iterator<Item = PermissionId>) -> Vec<Permission> {
        ids.filter_map(|id| self.permissions.get(&id).cloned()).collect()
    }
}

/// In-memory role graph store implementation
#[derive(Clone, Default)]
pub struct InMemoryRoleGraphStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRoleGraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleGraphStore for InMemoryRoleGraphStore {
    async fn role(&self, id: RoleId) -> Result<Role> {
        let tables = self.tables.read().await;
        tables.role(id).cloned()
    }

    async fn role_by_slug(&self, slug: &str) -> Result<Role> {
        let tables = self.tables.read().await;
        tables
            .roles
            .values()
            .find(|role| role.slug == slug)
            .cloned()
            .ok_or_else(|| RbacError::role_not_found(slug))
    }

    async fn roles_with_prefix(&self, prefix: &str) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .filter(|role| role.slug.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn insert_role(&self, role: NewRole) -> Result<Role> {
        let mut tables = self.tables.write().await;

        if tables.roles.values().any(|r| r.slug == role.slug) {
            return Err(RbacError::InvalidInput(format!(
                "Role slug '{}' already exists",
                role.slug
            )));
        }

        tables.next_role_id += 1;
        let stored = Role {
            id: tables.next_role_id,
            slug: role.slug,
            name: role.name,
            description: role.description,
        };
        tables.roles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_role(&self, role: &Role) -> Result<Role> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .roles
            .get_mut(&role.id)
            .ok_or_else(|| RbacError::role_not_found(role.id))?;

        if existing.slug != role.slug {
            return Err(RbacError::InvalidInput(format!(
                "Role slug is immutable ('{}' -> '{}')",
                existing.slug, role.slug
            )));
        }

        existing.name = role.name.clone();
        existing.description = role.description.clone();
        Ok(existing.clone())
    }

    async fn delete_role(&self, id: RoleId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.roles.remove(&id).is_none() {
            return Err(RbacError::role_not_found(id));
        }

        tables.role_inherits.retain(|(parent, child)| *parent != id && *child != id);
        tables.role_wildcards.retain(|(parent, _)| *parent != id);
        tables.role_permissions.retain(|(role, _)| *role != id);
        tables.user_roles.retain(|(_, role)| *role != id);
        Ok(())
    }

    async fn permission(&self, id: PermissionId) -> Result<Permission> {
        let tables = self.tables.read().await;
        tables.permission(id).cloned()
    }

    async fn permission_by_name(&self, name: &str) -> Result<Permission> {
        let tables = self.tables.read().await;
        tables
            .permissions
            .values()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| RbacError::permission_not_found(name))
    }

    async fn insert_permission(&self, permission: NewPermission) -> Result<Permission> {
        let mut tables = self.tables.write().await;

        if tables.permissions.values().any(|p| p.name == permission.name) {
            return Err(RbacError::InvalidInput(format!(
                "Permission '{}' already exists",
                permission.name
            )));
        }

        tables.next_permission_id += 1;
        let stored = Permission {
            id: tables.next_permission_id,
            name: permission.name,
            description: permission.description,
        };
        tables.permissions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_permission(&self, permission: &Permission) -> Result<Permission> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .permissions
            .get_mut(&permission.id)
            .ok_or_else(|| RbacError::permission_not_found(permission.id))?;

        if existing.name != permission.name {
            return Err(RbacError::InvalidInput(format!(
                "Permission name is immutable ('{}' -> '{}')",
                existing.name, permission.name
            )));
        }

        existing.description = permission.description.clone();
        Ok(existing.clone())
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.permissions.remove(&id).is_none() {
            return Err(RbacError::permission_not_found(id));
        }

        tables.role_permissions.retain(|(_, permission)| *permission != id);
        tables.user_permissions.retain(|(_, permission)| *permission != id);
        Ok(())
    }

    async fn child_roles(&self, parent: RoleId) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let children = tables
            .role_inherits
            .iter()
            .filter(|(p, _)| *p == parent)
            .map(|(_, child)| *child);
        Ok(tables.roles_for(children))
    }

    async fn parent_roles(&self, child: RoleId) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let parents = tables
            .role_inherits
            .iter()
            .filter(|(_, c)| *c == child)
            .map(|(parent, _)| *parent);
        Ok(tables.roles_for(parents))
    }

    async fn insert_inheritance(&self, parent: RoleId, child: RoleId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        tables.role(parent)?;
        tables.role(child)?;
        Ok(tables.role_inherits.insert((parent, child)))
    }

    async fn delete_inheritance(&self, parent: RoleId, child: RoleId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.role_inherits.remove(&(parent, child)))
    }

    async fn wildcard_patterns(&self, parent: RoleId) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .role_wildcards
            .iter()
            .filter(|(p, _)| *p == parent)
            .map(|(_, pattern)| pattern.clone())
            .collect())
    }

    async fn insert_wildcard(&self, parent: RoleId, pattern: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        tables.role(parent)?;
        Ok(tables.role_wildcards.insert((parent, pattern.to_string())))
    }

    async fn delete_wildcard(&self, parent: RoleId, pattern: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.role_wildcards.remove(&(parent, pattern.to_string())))
    }

    async fn role_permissions(&self, role: RoleId) -> Result<Vec<Permission>> {
        let tables = self.tables.read().await;
        let granted = tables
            .role_permissions
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, permission)| *permission);
        Ok(tables.permissions_for(granted))
    }

    async fn insert_role_permission(&self, role: RoleId, permission: PermissionId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        tables.role(role)?;
        tables.permission(permission)?;
        Ok(tables.role_permissions.insert((role, permission)))
    }

    async fn delete_role_permission(&self, role: RoleId, permission: PermissionId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.role_permissions.remove(&(role, permission)))
    }

    async fn user_roles(&self, principal: &str) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let assigned = tables
            .user_roles
            .iter()
            .filter(|(p, _)| p == principal)
            .map(|(_, role)| *role);
        Ok(tables.roles_for(assigned))
    }

    async fn principals_with_role(&self, role: RoleId) -> Result<Vec<PrincipalId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_roles
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(principal, _)| principal.clone())
            .collect())
    }

    async fn insert_user_role(&self, principal: &str, role: RoleId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let slug = tables.role(role)?.slug.clone();

        if !tables.user_roles.insert((principal.to_string(), role)) {
            return Err(RbacError::AlreadyAssigned {
                principal: principal.to_string(),
                role: slug,
            });
        }
        Ok(())
    }

    async fn delete_user_role(&self, principal: &str, role: RoleId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_roles.remove(&(principal.to_string(), role)))
    }

    async fn replace_user_roles(&self, principal: &str, roles: &[RoleId]) -> Result<()> {
        // Single write guard: readers see either the old or the new set, never neither.
        let mut tables = self.tables.write().await;
        for role in roles {
            tables.role(*role)?;
        }

        tables.user_roles.retain(|(p, _)| p != principal);
        for role in roles {
            tables.user_roles.insert((principal.to_string(), *role));
        }
        Ok(())
    }

    async fn user_permissions(&self, principal: &str) -> Result<Vec<Permission>> {
        let tables = self.tables.read().await;
        let granted = tables
            .user_permissions
            .iter()
            .filter(|(p, _)| p == principal)
            .map(|(_, permission)| *permission);
        Ok(tables.permissions_for(granted))
    }

    async fn insert_user_permission(&self, principal: &str, permission: PermissionId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        tables.permission(permission)?;
        Ok(tables.user_permissions.insert((principal.to_string(), permission)))
    }

    async fn delete_user_permission(&self, principal: &str, permission: PermissionId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_permissions.remove(&(principal.to_string(), permission)))
    }
}
