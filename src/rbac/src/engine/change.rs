//! Graph change notifications
//!
//! Every successful write is described by a [`GraphChange`] and published to
//! the engine's listeners before the write returns. The permission cache is
//! the first listener; callers may subscribe their own.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{PermissionId, PrincipalId, RoleId};

/// A mutation of the role graph or of a principal's assignments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphChange {
    RoleCreated { role: RoleId },
    RoleUpdated { role: RoleId },
    RoleDeleted { role: RoleId },

    PermissionCreated { permission: PermissionId },
    PermissionUpdated { permission: PermissionId },
    PermissionDeleted { permission: PermissionId },

    InheritanceAdded { parent: RoleId, child: RoleId },
    InheritanceRemoved { parent: RoleId, child: RoleId },

    WildcardAdded { parent: RoleId, pattern: String },
    WildcardRemoved { parent: RoleId, pattern: String },

    RolePermissionGranted { role: RoleId, permission: PermissionId },
    RolePermissionRevoked { role: RoleId, permission: PermissionId },

    /// A principal's direct role assignments changed
    UserRolesChanged { principal: PrincipalId },

    /// A principal's direct permission assignments changed
    UserPermissionsChanged { principal: PrincipalId },
}

/// Which cached resolutions a change can affect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope<'a> {
    /// Any principal's closure may have changed
    All,
    /// Only this principal's resolution is affected
    Principal(&'a str),
}

impl GraphChange {
    /// Invalidation scope for this change
    ///
    /// Structural changes reach every principal; assignment changes reach
    /// only the principal they name.
    pub fn scope(&self) -> InvalidationScope<'_> {
        match self {
            GraphChange::UserRolesChanged { principal }
            | GraphChange::UserPermissionsChanged { principal } => {
                InvalidationScope::Principal(principal)
            }
            _ => InvalidationScope::All,
        }
    }
}

/// Receives graph changes synchronously, before the write is acknowledged
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, change: &GraphChange);
}

/// Fan-out of graph changes to registered listeners
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl ChangeNotifier {
    /// Create a notifier with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; listeners are called in registration order
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Deliver a change to every listener
    pub fn publish(&self, change: &GraphChange) {
        debug!(?change, "Publishing graph change");
        for listener in self.listeners.read().iter() {
            listener.on_change(change);
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}
