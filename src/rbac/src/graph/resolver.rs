//! Role graph resolver
//!
//! Expands a set of directly held roles into their transitive closure over
//! three inheritance sources:
//!
//! - **Explicit edges**: `(parent, child)` rows; the parent absorbs the child
//! - **Name paths**: `admin.billing` inherits `admin` and `billing` when those
//!   roles exist
//! - **Wildcards**: `(parent, "admin.*")` rows, matched against live slugs
//!
//! # Algorithm
//!
//! A worklist seeded with the direct roles and a `visited` set scoped to one
//! call. A popped role that was already visited is skipped; otherwise it is
//! marked and its three sources are pushed. The visited set only grows and is
//! bounded by the number of roles, so resolution terminates on any graph,
//! cyclic or not.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::wildcard::WildcardMatcher;
use crate::error::{RbacError, Result};
use crate::store::RoleGraphStore;
use crate::types::{Role, RoleId, RoleSet};

/// Resolves role closures against a [`RoleGraphStore`]
///
/// The resolver holds no traversal state between calls and can be shared
/// across tasks.
#[derive(Clone)]
pub struct RoleGraphResolver {
    store: Arc<dyn RoleGraphStore>,
    matcher: WildcardMatcher,
}

impl RoleGraphResolver {
    /// Create a resolver over a store
    pub fn new(store: Arc<dyn RoleGraphStore>) -> Self {
        let matcher = WildcardMatcher::new(Arc::clone(&store));
        Self { store, matcher }
    }

    /// Transitive closure of `direct`, including the direct roles themselves
    pub async fn resolve<I>(&self, direct: I) -> Result<RoleSet>
    where
        I: IntoIterator<Item = Role>,
    {
        self.resolve_with_deadline(direct, None).await
    }

    /// Like [`resolve`](Self::resolve), checking `deadline` before each expansion
    ///
    /// # Errors
    ///
    /// - `DeadlineExceeded` when the deadline passes mid-traversal
    /// - any store error raised while reading edges
    pub async fn resolve_with_deadline<I>(
        &self,
        direct: I,
        deadline: Option<Instant>,
    ) -> Result<RoleSet>
    where
        I: IntoIterator<Item = Role>,
    {
        let mut queue: VecDeque<Role> = direct.into_iter().collect();
        let mut visited: HashSet<RoleId> = HashSet::with_capacity(queue.len());
        let mut resolved = RoleSet::new();

        while let Some(role) = queue.pop_front() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(visited = visited.len(), "Role resolution deadline exceeded");
                    return Err(RbacError::DeadlineExceeded {
                        visited: visited.len(),
                    });
                }
            }

            if !visited.insert(role.id) {
                continue;
            }

            for inherited in self.inherited_roles(&role).await? {
                if !visited.contains(&inherited.id) {
                    queue.push_back(inherited);
                }
            }

            resolved.insert(role);
        }

        debug!(roles = resolved.len(), "Resolved role closure");
        Ok(resolved)
    }

    /// Roles one step away from `role` through any inheritance source
    ///
    /// The result may contain duplicates and `role` itself; the caller's
    /// visited set absorbs both.
    pub async fn inherited_roles(&self, role: &Role) -> Result<Vec<Role>> {
        let mut inherited = self.store.child_roles(role.id).await?;
        inherited.extend(self.path_roles(role).await?);

        for pattern in self.store.wildcard_patterns(role.id).await? {
            inherited.extend(self.matcher.matches(&pattern).await?);
        }

        Ok(inherited)
    }

    /// Existing roles named by the dot-separated segments of the slug
    async fn path_roles(&self, role: &Role) -> Result<Vec<Role>> {
        let mut roles = Vec::new();
        if !role.slug.contains('.') {
            return Ok(roles);
        }

        for segment in role.path_segments() {
            match self.store.role_by_slug(segment).await {
                Ok(found) => roles.push(found),
                Err(e) if e.is_not_found() => {
                    debug!(role = %role.slug, segment, "Skipping missing path segment");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(roles)
    }
}
