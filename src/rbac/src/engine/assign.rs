//! Graph and assignment mutators
//!
//! Every mutator writes through the store, then publishes the matching
//! [`GraphChange`] before returning. A write that changed nothing (an edge
//! that already existed, a removal of an absent edge) publishes nothing.

use std::collections::{BTreeSet, HashSet};

use tracing::info;

use super::change::GraphChange;
use super::RbacEngine;
use crate::error::{RbacError, Result};
use crate::graph::{pattern_prefix, WildcardPattern, WILDCARD};
use crate::types::{
    NewPermission, NewRole, Permission, PermissionRef, PrincipalId, Role, RoleRef,
};

impl RbacEngine {
    // ========================================================================
    // Principal role assignments
    // ========================================================================

    /// Assign roles directly to a principal
    ///
    /// Fails with `AlreadyAssigned`, assigning nothing, if any role is already
    /// held directly or appears twice in `roles`.
    pub async fn assign_role<I>(&self, principal: &str, roles: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<RoleRef>,
    {
        let refs: Vec<RoleRef> = roles.into_iter().map(Into::into).collect();
        let roles = self.lookup_roles(&refs).await?;

        let mut held: HashSet<_> = self
            .store
            .user_roles(principal)
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();
        for role in &roles {
            if !held.insert(role.id) {
                return Err(RbacError::AlreadyAssigned {
                    principal: principal.to_string(),
                    role: role.slug.clone(),
                });
            }
        }

        let mut result = Ok(());
        let mut assigned = 0;
        for role in &roles {
            if let Err(e) = self.store.insert_user_role(principal, role.id).await {
                result = Err(e);
                break;
            }
            assigned += 1;
        }

        // A concurrent writer can still trip the store's constraint midway;
        // whatever did land must be invalidated.
        if assigned > 0 {
            info!(principal, assigned, "Assigned roles");
            self.publish(GraphChange::UserRolesChanged {
                principal: principal.to_string(),
            });
        }
        result
    }

    /// Remove a direct role assignment; returns false if it was not assigned
    pub async fn remove_role(&self, principal: &str, role: impl Into<RoleRef>) -> Result<bool> {
        let role = self.lookup_role(&role.into()).await?;
        let removed = self.store.delete_user_role(principal, role.id).await?;

        if removed {
            info!(principal, role = %role.slug, "Removed role");
            self.publish(GraphChange::UserRolesChanged {
                principal: principal.to_string(),
            });
        }
        Ok(removed)
    }

    /// Replace the principal's direct roles with exactly `roles`
    pub async fn sync_roles<I>(&self, principal: &str, roles: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<RoleRef>,
    {
        let refs: Vec<RoleRef> = roles.into_iter().map(Into::into).collect();
        let ids: Vec<_> = self
            .lookup_roles(&refs)
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        self.store.replace_user_roles(principal, &ids).await?;

        info!(principal, roles = ids.len(), "Synced roles");
        self.publish(GraphChange::UserRolesChanged {
            principal: principal.to_string(),
        });
        Ok(())
    }

    /// Principals directly holding any of `roles`, sorted
    pub async fn principals_with_role<I>(&self, roles: I) -> Result<Vec<PrincipalId>>
    where
        I: IntoIterator,
        I::Item: Into<RoleRef>,
    {
        let refs: Vec<RoleRef> = roles.into_iter().map(Into::into).collect();
        let mut principals = BTreeSet::new();
        for role in self.lookup_roles(&refs).await? {
            principals.extend(self.store.principals_with_role(role.id).await?);
        }
        Ok(principals.into_iter().collect())
    }

    // ========================================================================
    // Principal permission assignments
    // ========================================================================

    /// Grant a permission directly to a principal
    pub async fn give_permission(
        &self,
        principal: &str,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let permission = self.lookup_permission(&permission.into()).await?;
        let granted = self.store.insert_user_permission(principal, permission.id).await?;

        if granted {
            info!(principal, permission = %permission.name, "Granted permission");
            self.publish(GraphChange::UserPermissionsChanged {
                principal: principal.to_string(),
            });
        }
        Ok(granted)
    }

    /// Revoke a permission granted directly to a principal
    pub async fn revoke_permission(
        &self,
        principal: &str,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let permission = self.lookup_permission(&permission.into()).await?;
        let revoked = self.store.delete_user_permission(principal, permission.id).await?;

        if revoked {
            info!(principal, permission = %permission.name, "Revoked permission");
            self.publish(GraphChange::UserPermissionsChanged {
                principal: principal.to_string(),
            });
        }
        Ok(revoked)
    }

    // ========================================================================
    // Inheritance
    // ========================================================================

    /// Make `parent` inherit `child`
    ///
    /// A child slug ending in `*` creates a wildcard edge instead. With cycle
    /// rejection enabled, fails with `CycleDetected` when `parent` is already
    /// reachable from `child`.
    pub async fn assign_child(
        &self,
        parent: impl Into<RoleRef>,
        child: impl Into<RoleRef>,
    ) -> Result<bool> {
        let parent = parent.into();
        let child = child.into();
        if let RoleRef::Slug(slug) = &child {
            if pattern_prefix(slug).is_some() {
                return self.assign_wildcard(parent, slug).await;
            }
        }

        let parent = self.lookup_role(&parent).await?;
        let child = self.lookup_role(&child).await?;

        if self.config.resolver.reject_cycles {
            self.ensure_acyclic(&parent, vec![child.clone()]).await?;
        }

        let added = self.store.insert_inheritance(parent.id, child.id).await?;
        if added {
            info!(parent = %parent.slug, child = %child.slug, "Added inheritance edge");
            self.publish(GraphChange::InheritanceAdded {
                parent: parent.id,
                child: child.id,
            });
        }
        Ok(added)
    }

    /// Make `parent` inherit every role matching `pattern`
    pub async fn assign_wildcard(&self, parent: impl Into<RoleRef>, pattern: &str) -> Result<bool> {
        let pattern = WildcardPattern::parse(pattern)?;
        let parent = self.lookup_role(&parent.into()).await?;

        if self.config.resolver.reject_cycles {
            let matched = self.store.roles_with_prefix(pattern.prefix()).await?;
            self.ensure_acyclic(&parent, matched).await?;
        }

        let added = self.store.insert_wildcard(parent.id, pattern.as_str()).await?;
        if added {
            info!(parent = %parent.slug, %pattern, "Added wildcard edge");
            self.publish(GraphChange::WildcardAdded {
                parent: parent.id,
                pattern: pattern.into(),
            });
        }
        Ok(added)
    }

    /// Remove an inheritance edge; a child slug ending in `*` removes the
    /// wildcard edge with that pattern
    pub async fn detach_child(
        &self,
        parent: impl Into<RoleRef>,
        child: impl Into<RoleRef>,
    ) -> Result<bool> {
        let parent = parent.into();
        let child = child.into();
        if let RoleRef::Slug(slug) = &child {
            if slug.ends_with(WILDCARD) {
                return self.detach_wildcard(parent, slug).await;
            }
        }

        let parent = self.lookup_role(&parent).await?;
        let child = self.lookup_role(&child).await?;

        let removed = self.store.delete_inheritance(parent.id, child.id).await?;
        if removed {
            info!(parent = %parent.slug, child = %child.slug, "Removed inheritance edge");
            self.publish(GraphChange::InheritanceRemoved {
                parent: parent.id,
                child: child.id,
            });
        }
        Ok(removed)
    }

    /// Remove a wildcard edge
    ///
    /// The pattern is not validated, so malformed edges can be cleaned up.
    pub async fn detach_wildcard(&self, parent: impl Into<RoleRef>, pattern: &str) -> Result<bool> {
        let parent = self.lookup_role(&parent.into()).await?;

        let removed = self.store.delete_wildcard(parent.id, pattern).await?;
        if removed {
            info!(parent = %parent.slug, pattern, "Removed wildcard edge");
            self.publish(GraphChange::WildcardRemoved {
                parent: parent.id,
                pattern: pattern.to_string(),
            });
        }
        Ok(removed)
    }

    /// Fail if `parent` is reachable from any of `children`
    async fn ensure_acyclic(&self, parent: &Role, children: Vec<Role>) -> Result<()> {
        let reachable = self.resolver.resolve(children).await?;
        if reachable.contains_id(parent.id) {
            return Err(RbacError::CycleDetected(format!(
                "role '{}' is already reachable from the new child",
                parent.slug
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Role permissions
    // ========================================================================

    /// Grant a permission to a role
    pub async fn grant_to_role(
        &self,
        role: impl Into<RoleRef>,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let role = self.lookup_role(&role.into()).await?;
        let permission = self.lookup_permission(&permission.into()).await?;

        let granted = self.store.insert_role_permission(role.id, permission.id).await?;
        if granted {
            info!(role = %role.slug, permission = %permission.name, "Granted permission to role");
            self.publish(GraphChange::RolePermissionGranted {
                role: role.id,
                permission: permission.id,
            });
        }
        Ok(granted)
    }

    /// Revoke a permission from a role
    pub async fn revoke_from_role(
        &self,
        role: impl Into<RoleRef>,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let role = self.lookup_role(&role.into()).await?;
        let permission = self.lookup_permission(&permission.into()).await?;

        let revoked = self.store.delete_role_permission(role.id, permission.id).await?;
        if revoked {
            info!(role = %role.slug, permission = %permission.name, "Revoked permission from role");
            self.publish(GraphChange::RolePermissionRevoked {
                role: role.id,
                permission: permission.id,
            });
        }
        Ok(revoked)
    }

    // ========================================================================
    // Roles and permissions
    // ========================================================================

    /// Create a role
    ///
    /// Slugs must be non-empty and may not contain `*`, which is reserved for
    /// wildcard patterns.
    pub async fn create_role(&self, role: NewRole) -> Result<Role> {
        if role.slug.trim().is_empty() {
            return Err(RbacError::InvalidInput("Role slug must not be empty".to_string()));
        }
        if role.slug.contains(WILDCARD) {
            return Err(RbacError::InvalidInput(format!(
                "Role slug '{}' must not contain '{}'",
                role.slug, WILDCARD
            )));
        }

        let role = self.store.insert_role(role).await?;
        info!(role = %role.slug, id = role.id, "Created role");
        self.publish(GraphChange::RoleCreated { role: role.id });
        Ok(role)
    }

    /// Update a role's display attributes
    pub async fn update_role(&self, role: &Role) -> Result<Role> {
        let updated = self.store.update_role(role).await?;
        info!(role = %updated.slug, "Updated role");
        self.publish(GraphChange::RoleUpdated { role: updated.id });
        Ok(updated)
    }

    /// Delete a role with its edges and assignments
    pub async fn delete_role(&self, role: impl Into<RoleRef>) -> Result<()> {
        let role = self.lookup_role(&role.into()).await?;
        self.store.delete_role(role.id).await?;
        info!(role = %role.slug, "Deleted role");
        self.publish(GraphChange::RoleDeleted { role: role.id });
        Ok(())
    }

    /// Create a permission
    pub async fn create_permission(&self, permission: NewPermission) -> Result<Permission> {
        if permission.name.trim().is_empty() {
            return Err(RbacError::InvalidInput(
                "Permission name must not be empty".to_string(),
            ));
        }

        let permission = self.store.insert_permission(permission).await?;
        info!(permission = %permission.name, id = permission.id, "Created permission");
        self.publish(GraphChange::PermissionCreated {
            permission: permission.id,
        });
        Ok(permission)
    }

    /// Update a permission's description
    pub async fn update_permission(&self, permission: &Permission) -> Result<Permission> {
        let updated = self.store.update_permission(permission).await?;
        info!(permission = %updated.name, "Updated permission");
        self.publish(GraphChange::PermissionUpdated {
            permission: updated.id,
        });
        Ok(updated)
    }

    /// Delete a permission with its assignments
    pub async fn delete_permission(&self, permission: impl Into<PermissionRef>) -> Result<()> {
        let permission = self.lookup_permission(&permission.into()).await?;
        self.store.delete_permission(permission.id).await?;
        info!(permission = %permission.name, "Deleted permission");
        self.publish(GraphChange::PermissionDeleted {
            permission: permission.id,
        });
        Ok(())
    }
}
