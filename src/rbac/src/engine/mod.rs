//! Role graph engine
//!
//! [`RbacEngine`] ties the store, resolver, aggregator and permission cache
//! together. Reads go through the cache; writes go through the engine's
//! mutators, which publish a [`GraphChange`] before returning so that no
//! stale resolution is observable after a write is acknowledged.
//!
//! Writes made to the store by other means must be reported through
//! [`RbacEngine::notify`].

pub mod cache;
pub mod change;
pub mod decision;
pub mod metrics;

mod assign;
mod evaluator;

pub use cache::{CacheConfig, CacheStats, CacheToken, PermissionCache};
pub use change::{ChangeListener, ChangeNotifier, GraphChange, InvalidationScope};
pub use decision::{AccessDecision, AccessRequirement, DecisionReason};
pub use metrics::{EngineMetrics, MetricsCollector};

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::RbacConfig;
use crate::error::{RbacError, Result};
use crate::graph::{PermissionAggregator, RoleGraphResolver};
use crate::store::RoleGraphStore;
use crate::types::{
    EffectiveAccess, Permission, PermissionRef, PermissionSet, Role, RoleRef, RoleSet,
};

/// Role-based access control engine
pub struct RbacEngine {
    store: Arc<dyn RoleGraphStore>,
    resolver: RoleGraphResolver,
    aggregator: PermissionAggregator,
    cache: Option<Arc<PermissionCache>>,
    notifier: ChangeNotifier,
    metrics: MetricsCollector,
    config: RbacConfig,
}

impl RbacEngine {
    /// Create an engine over a store
    pub fn new(store: Arc<dyn RoleGraphStore>, config: RbacConfig) -> Self {
        let resolver = RoleGraphResolver::new(Arc::clone(&store));
        let aggregator = PermissionAggregator::new(Arc::clone(&store), resolver.clone());
        let notifier = ChangeNotifier::new();

        let cache = if config.cache.enabled {
            let cache = Arc::new(PermissionCache::new(CacheConfig::from(&config.cache)));
            notifier.subscribe(cache.clone());
            Some(cache)
        } else {
            None
        };

        info!(
            cache_enabled = config.cache.enabled,
            reject_cycles = config.resolver.reject_cycles,
            "Role graph engine initialized"
        );

        Self {
            store,
            resolver,
            aggregator,
            cache,
            notifier,
            metrics: MetricsCollector::new(),
            config,
        }
    }

    /// Create an engine with default configuration
    pub fn with_defaults(store: Arc<dyn RoleGraphStore>) -> Self {
        Self::new(store, RbacConfig::default())
    }

    /// Validate `config`, then create the engine
    pub fn try_new(store: Arc<dyn RoleGraphStore>, config: RbacConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RbacError::Config(e.to_string()))?;
        Ok(Self::new(store, config))
    }

    /// The underlying role graph store
    pub fn store(&self) -> &Arc<dyn RoleGraphStore> {
        &self.store
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &RbacConfig {
        &self.config
    }

    /// Register an additional change listener
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.notifier.subscribe(listener);
    }

    /// Report a write made to the store outside the engine
    pub fn notify(&self, change: GraphChange) {
        self.notifier.publish(&change);
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// A principal's effective roles and permissions, served from the cache
    /// when possible
    pub async fn effective_access(&self, principal: &str) -> Result<Arc<EffectiveAccess>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.compute_access(principal).await?));
        };

        if let Some(access) = cache.get(principal) {
            debug!(principal, "Cache hit");
            self.metrics.record_cache_hit().await;
            return Ok(access);
        }
        self.metrics.record_cache_miss().await;

        // Token first, store reads second
        let token = cache.begin();
        let access = Arc::new(self.compute_access(principal).await?);
        cache.put(principal, Arc::clone(&access), token);

        Ok(access)
    }

    /// Transitive closure of the principal's direct roles
    pub async fn effective_roles(&self, principal: &str) -> Result<RoleSet> {
        Ok(self.effective_access(principal).await?.roles.clone())
    }

    /// Direct permissions plus those of every effective role
    pub async fn effective_permissions(&self, principal: &str) -> Result<PermissionSet> {
        Ok(self.effective_access(principal).await?.permissions.clone())
    }

    /// Closure of an arbitrary set of roles; bypasses the cache
    pub async fn resolve<I>(&self, roles: I) -> Result<RoleSet>
    where
        I: IntoIterator,
        I::Item: Into<RoleRef>,
    {
        let refs: Vec<RoleRef> = roles.into_iter().map(Into::into).collect();
        let direct = self.lookup_roles(&refs).await?;
        self.resolver.resolve_with_deadline(direct, self.deadline()).await
    }

    /// Every role a single role reaches, itself included
    pub async fn role_closure(&self, role: impl Into<RoleRef>) -> Result<RoleSet> {
        let role = self.lookup_role(&role.into()).await?;
        self.resolver.resolve_with_deadline([role], self.deadline()).await
    }

    /// A role's own grants plus the grants of every role it reaches
    pub async fn role_permissions_closure(&self, role: impl Into<RoleRef>) -> Result<PermissionSet> {
        let roles = self.role_closure(role).await?;
        self.aggregator.granted_to(&roles).await
    }

    async fn compute_access(&self, principal: &str) -> Result<EffectiveAccess> {
        let started = Instant::now();
        match self
            .aggregator
            .aggregate_with_deadline(principal, self.deadline())
            .await
        {
            Ok(access) => {
                self.metrics.record_resolution(started.elapsed()).await;
                Ok(access)
            }
            Err(e) => {
                self.metrics.record_error().await;
                Err(e)
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.config
            .resolver
            .deadline()
            .map(|budget| Instant::now() + budget)
    }

    // ========================================================================
    // Reference lookup
    // ========================================================================

    /// Resolve a role reference to a stored role
    pub async fn lookup_role(&self, role: &RoleRef) -> Result<Role> {
        match role {
            RoleRef::Role(role) => Ok(role.clone()),
            RoleRef::Id(id) => self.store.role(*id).await,
            RoleRef::Slug(slug) => self.store.role_by_slug(slug).await,
        }
    }

    /// Resolve a permission reference to a stored permission
    pub async fn lookup_permission(&self, permission: &PermissionRef) -> Result<Permission> {
        match permission {
            PermissionRef::Permission(permission) => Ok(permission.clone()),
            PermissionRef::Id(id) => self.store.permission(*id).await,
            PermissionRef::Name(name) => self.store.permission_by_name(name).await,
        }
    }

    async fn lookup_roles(&self, refs: &[RoleRef]) -> Result<Vec<Role>> {
        let mut roles = Vec::with_capacity(refs.len());
        for role in refs {
            roles.push(self.lookup_role(role).await?);
        }
        Ok(roles)
    }

    /// Like [`lookup_role`](Self::lookup_role), mapping a miss to `None`
    async fn find_role(&self, role: &RoleRef) -> Result<Option<Role>> {
        match self.lookup_role(role).await {
            Ok(role) => Ok(Some(role)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_permission(&self, permission: &PermissionRef) -> Result<Option<Permission>> {
        match self.lookup_permission(permission).await {
            Ok(permission) => Ok(Some(permission)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Observability
    // ========================================================================

    /// Engine metrics snapshot
    pub async fn metrics(&self) -> EngineMetrics {
        self.metrics.snapshot().await
    }

    /// Cache statistics, `None` when the cache is disabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    fn publish(&self, change: GraphChange) {
        self.notifier.publish(&change);
    }
}
