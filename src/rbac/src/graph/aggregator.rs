//! Permission aggregation over resolved roles

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::debug;

use super::resolver::RoleGraphResolver;
use crate::error::Result;
use crate::store::RoleGraphStore;
use crate::types::{EffectiveAccess, PermissionSet, Role, RoleSet};

/// Merges direct principal permissions with the permissions of every
/// resolved role
///
/// Permissions carry no inheritance of their own; the union is flat and
/// deduplicated by permission id.
#[derive(Clone)]
pub struct PermissionAggregator {
    store: Arc<dyn RoleGraphStore>,
    resolver: RoleGraphResolver,
}

impl PermissionAggregator {
    /// Create an aggregator sharing the resolver's store
    pub fn new(store: Arc<dyn RoleGraphStore>, resolver: RoleGraphResolver) -> Self {
        Self { store, resolver }
    }

    /// Effective roles and permissions of a principal
    pub async fn aggregate(&self, principal: &str) -> Result<EffectiveAccess> {
        self.aggregate_with_deadline(principal, None).await
    }

    /// Like [`aggregate`](Self::aggregate) with a resolution deadline
    pub async fn aggregate_with_deadline(
        &self,
        principal: &str,
        deadline: Option<Instant>,
    ) -> Result<EffectiveAccess> {
        let direct_roles = self.store.user_roles(principal).await?;
        let roles = self
            .resolver
            .resolve_with_deadline(direct_roles, deadline)
            .await?;

        let mut permissions: PermissionSet =
            self.store.user_permissions(principal).await?.into_iter().collect();
        permissions.extend(self.granted_to(&roles).await?);

        debug!(
            principal,
            roles = roles.len(),
            permissions = permissions.len(),
            "Aggregated effective access"
        );

        Ok(EffectiveAccess { roles, permissions })
    }

    /// Effective permission set of a single role: its own grants plus those
    /// of every role it inherits
    pub async fn role_permissions(&self, role: &Role) -> Result<PermissionSet> {
        let roles = self.resolver.resolve(vec![role.clone()]).await?;
        self.granted_to(&roles).await
    }

    /// Union of the permissions granted directly to each role in the set
    pub async fn granted_to(&self, roles: &RoleSet) -> Result<PermissionSet> {
        let grants = try_join_all(roles.iter().map(|role| self.store.role_permissions(role.id))).await?;
        Ok(grants.into_iter().flatten().collect())
    }
}
