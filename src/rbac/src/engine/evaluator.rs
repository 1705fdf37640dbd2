//! Authorization predicates
//!
//! Names that match no stored role or permission are treated as not held:
//! boolean predicates return `false` and structured checks deny with an
//! `Unknown*` reason. Only store failures are returned as errors.

use tracing::debug;

use super::decision::{AccessDecision, AccessRequirement, DecisionReason};
use super::RbacEngine;
use crate::error::Result;
use crate::types::{PermissionRef, RoleId, RoleRef};

impl RbacEngine {
    /// Whether `role` is in the principal's effective role set
    pub async fn has_role(&self, principal: &str, role: impl Into<RoleRef>) -> Result<bool> {
        let Some(role) = self.find_role(&role.into()).await? else {
            return self.checked(false).await;
        };
        let held = self.effective_access(principal).await?.roles.contains_id(role.id);
        self.checked(held).await
    }

    /// Whether at least one of `roles` is held; false for an empty input
    pub async fn has_any_role<I>(&self, principal: &str, roles: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Into<RoleRef>,
    {
        let refs: Vec<RoleRef> = roles.into_iter().map(Into::into).collect();
        let known = self.known_role_ids(&refs).await?;
        if known.is_empty() {
            return self.checked(false).await;
        }

        let access = self.effective_access(principal).await?;
        let held = known.iter().any(|id| access.roles.contains_id(*id));
        self.checked(held).await
    }

    /// Whether every one of `roles` is held; true for an empty input
    ///
    /// An unknown role cannot be held, so it makes the check fail.
    pub async fn has_all_roles<I>(&self, principal: &str, roles: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Into<RoleRef>,
    {
        let refs: Vec<RoleRef> = roles.into_iter().map(Into::into).collect();
        let mut ids = Vec::with_capacity(refs.len());
        for role in &refs {
            match self.find_role(role).await? {
                Some(role) => ids.push(role.id),
                None => return self.checked(false).await,
            }
        }
        if ids.is_empty() {
            return self.checked(true).await;
        }

        let access = self.effective_access(principal).await?;
        let held = ids.iter().all(|id| access.roles.contains_id(*id));
        self.checked(held).await
    }

    /// Whether `permission` is in the principal's effective permission set
    pub async fn can(&self, principal: &str, permission: impl Into<PermissionRef>) -> Result<bool> {
        let Some(permission) = self.find_permission(&permission.into()).await? else {
            return self.checked(false).await;
        };
        let held = self
            .effective_access(principal)
            .await?
            .permissions
            .contains_id(permission.id);
        self.checked(held).await
    }

    /// Whether at least one of `permissions` is held
    pub async fn can_any<I>(&self, principal: &str, permissions: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Into<PermissionRef>,
    {
        let refs: Vec<PermissionRef> = permissions.into_iter().map(Into::into).collect();
        let mut known = Vec::with_capacity(refs.len());
        for permission in &refs {
            if let Some(permission) = self.find_permission(permission).await? {
                known.push(permission.id);
            }
        }
        if known.is_empty() {
            return self.checked(false).await;
        }

        let access = self.effective_access(principal).await?;
        let held = known.iter().any(|id| access.permissions.contains_id(*id));
        self.checked(held).await
    }

    /// Structured role check
    pub async fn check_role(&self, principal: &str, role: impl Into<RoleRef>) -> Result<AccessDecision> {
        let role = role.into();
        let Some(found) = self.find_role(&role).await? else {
            return self
                .decide(principal, DecisionReason::UnknownRole { role: role.key() })
                .await;
        };

        let reason = if self.effective_access(principal).await?.roles.contains_id(found.id) {
            DecisionReason::Granted
        } else {
            DecisionReason::MissingRole { roles: vec![found.slug] }
        };
        self.decide(principal, reason).await
    }

    /// Structured permission check
    pub async fn check_permission(
        &self,
        principal: &str,
        permission: impl Into<PermissionRef>,
    ) -> Result<AccessDecision> {
        let reason = self.permission_reason(principal, &permission.into()).await?;
        self.decide(principal, reason).await
    }

    /// Check a principal against a requirement
    ///
    /// The role condition is met by any one listed role. Both the role and
    /// the permission condition must hold when present.
    pub async fn authorize(
        &self,
        principal: &str,
        requirement: &AccessRequirement,
    ) -> Result<AccessDecision> {
        if !requirement.roles.is_empty() {
            let refs: Vec<RoleRef> = requirement.roles.iter().map(RoleRef::from).collect();
            let known = self.known_role_ids(&refs).await?;
            let access = self.effective_access(principal).await?;

            if !known.iter().any(|id| access.roles.contains_id(*id)) {
                let reason = DecisionReason::MissingRole {
                    roles: requirement.roles.clone(),
                };
                return self.decide(principal, reason).await;
            }
        }

        if let Some(permission) = &requirement.permission {
            let reason = self
                .permission_reason(principal, &PermissionRef::from(permission.as_str()))
                .await?;
            if reason != DecisionReason::Granted {
                return self.decide(principal, reason).await;
            }
        }

        self.decide(principal, DecisionReason::Granted).await
    }

    async fn permission_reason(
        &self,
        principal: &str,
        permission: &PermissionRef,
    ) -> Result<DecisionReason> {
        let Some(found) = self.find_permission(permission).await? else {
            return Ok(DecisionReason::UnknownPermission {
                permission: permission.key(),
            });
        };

        let held = self
            .effective_access(principal)
            .await?
            .permissions
            .contains_id(found.id);
        Ok(if held {
            DecisionReason::Granted
        } else {
            DecisionReason::MissingPermission { permission: found.name }
        })
    }

    async fn known_role_ids(&self, refs: &[RoleRef]) -> Result<Vec<RoleId>> {
        let mut ids = Vec::with_capacity(refs.len());
        for role in refs {
            if let Some(role) = self.find_role(role).await? {
                ids.push(role.id);
            }
        }
        Ok(ids)
    }

    async fn checked(&self, allowed: bool) -> Result<bool> {
        self.metrics.record_check(allowed).await;
        Ok(allowed)
    }

    async fn decide(&self, principal: &str, reason: DecisionReason) -> Result<AccessDecision> {
        let allowed = reason == DecisionReason::Granted;
        self.metrics.record_check(allowed).await;
        debug!(principal, allowed, ?reason, "Authorization decision");

        Ok(if allowed {
            AccessDecision::allow(principal, reason)
        } else {
            AccessDecision::deny(principal, reason)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{AccessRequirement, DecisionReason, RbacEngine};
    use crate::store::{InMemoryRoleGraphStore, RoleGraphStore};
    use crate::types::{NewPermission, NewRole};
    use std::sync::Arc;

    async fn engine() -> RbacEngine {
        let store = Arc::new(InMemoryRoleGraphStore::new());
        let admin = store.insert_role(NewRole::new("admin")).await.unwrap();
        let editor = store.insert_role(NewRole::new("editor")).await.unwrap();
        store.insert_role(NewRole::new("guest")).await.unwrap();
        let publish = store.insert_permission(NewPermission::new("publish")).await.unwrap();
        store.insert_permission(NewPermission::new("delete")).await.unwrap();
        let export = store.insert_permission(NewPermission::new("export")).await.unwrap();

        store.insert_inheritance(admin.id, editor.id).await.unwrap();
        store.insert_role_permission(editor.id, publish.id).await.unwrap();
        store.insert_user_role("user:1", admin.id).await.unwrap();
        store.insert_user_permission("user:1", export.id).await.unwrap();

        RbacEngine::with_defaults(store)
    }

    #[tokio::test]
    async fn test_role_predicates() {
        let engine = engine().await;

        assert!(engine.has_role("user:1", "admin").await.unwrap());
        assert!(engine.has_role("user:1", "editor").await.unwrap());
        assert!(!engine.has_role("user:1", "guest").await.unwrap());
        assert!(!engine.has_role("user:1", "ghost").await.unwrap());

        assert!(engine.has_any_role("user:1", ["guest", "editor"]).await.unwrap());
        assert!(!engine.has_any_role("user:1", ["guest", "ghost"]).await.unwrap());
        assert!(!engine.has_any_role("user:1", Vec::<&str>::new()).await.unwrap());

        assert!(engine.has_all_roles("user:1", ["admin", "editor"]).await.unwrap());
        assert!(!engine.has_all_roles("user:1", ["admin", "guest"]).await.unwrap());
        assert!(!engine.has_all_roles("user:1", ["admin", "ghost"]).await.unwrap());
        assert!(engine.has_all_roles("user:1", Vec::<&str>::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_permission_predicates() {
        let engine = engine().await;

        assert!(engine.can("user:1", "publish").await.unwrap());
        assert!(engine.can("user:1", "export").await.unwrap());
        assert!(!engine.can("user:1", "delete").await.unwrap());
        assert!(!engine.can("user:1", "ghost").await.unwrap());
        assert!(!engine.can("user:2", "publish").await.unwrap());

        assert!(engine.can_any("user:1", ["delete", "export"]).await.unwrap());
        assert!(!engine.can_any("user:1", ["delete", "ghost"]).await.unwrap());
    }

    #[tokio::test]
    async fn test_structured_checks() {
        let engine = engine().await;

        let decision = engine.check_role("user:1", "editor").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Granted);

        let decision = engine.check_role("user:1", "guest").await.unwrap();
        assert_eq!(decision.reason, DecisionReason::MissingRole { roles: vec!["guest".into()] });

        let decision = engine.check_role("user:1", "ghost").await.unwrap();
        assert_eq!(decision.reason, DecisionReason::UnknownRole { role: "ghost".into() });

        let decision = engine.check_permission("user:1", "delete").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            DecisionReason::MissingPermission { permission: "delete".into() }
        );

        let decision = engine.check_permission("user:1", "ghost").await.unwrap();
        assert_eq!(
            decision.reason,
            DecisionReason::UnknownPermission { permission: "ghost".into() }
        );
    }

    #[tokio::test]
    async fn test_authorize_requirements() {
        let engine = engine().await;

        assert!(engine.authorize("user:1", &AccessRequirement::new()).await.unwrap().allowed);

        let requirement = AccessRequirement::new().any_role(["guest", "editor"]).permission("publish");
        assert!(engine.authorize("user:1", &requirement).await.unwrap().allowed);

        let requirement = AccessRequirement::new().role("guest");
        let decision = engine.authorize("user:1", &requirement).await.unwrap();
        assert_eq!(decision.reason, DecisionReason::MissingRole { roles: vec!["guest".into()] });

        let requirement = AccessRequirement::new().role("admin").permission("delete");
        let decision = engine.authorize("user:1", &requirement).await.unwrap();
        assert_eq!(
            decision.reason,
            DecisionReason::MissingPermission { permission: "delete".into() }
        );

        let metrics = engine.metrics().await;
        assert_eq!(metrics.total_checks, 4);
        assert_eq!(metrics.allowed_checks, 2);
    }
}
