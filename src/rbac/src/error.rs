//! Error types for the role graph engine

use std::fmt;
use thiserror::Error;

/// Kind of entity a lookup was performed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Role lookup (by id or slug)
    Role,
    /// Permission lookup (by id or name)
    Permission,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Role => f.write_str("role"),
            EntityKind::Permission => f.write_str("permission"),
        }
    }
}

/// Role graph engine errors
#[derive(Debug, Error)]
pub enum RbacError {
    /// A role or permission lookup found no matching entity
    #[error("{kind} not found: {key}")]
    NotFound {
        /// What was looked up
        kind: EntityKind,
        /// The id or name that was looked up
        key: String,
    },

    /// The role is already directly assigned to the principal
    #[error("Role '{role}' is already assigned to principal '{principal}'")]
    AlreadyAssigned {
        /// Principal identifier
        principal: String,
        /// Role slug
        role: String,
    },

    /// An inheritance edge would close a cycle (only when cycle rejection is enabled)
    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resolution ran past its deadline
    #[error("Role resolution exceeded its deadline after visiting {visited} roles")]
    DeadlineExceeded {
        /// Number of roles expanded before the deadline hit
        visited: usize,
    },

    /// The role graph store failed
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RbacError {
    /// Role lookup miss
    pub fn role_not_found(key: impl ToString) -> Self {
        RbacError::NotFound {
            kind: EntityKind::Role,
            key: key.to_string(),
        }
    }

    /// Permission lookup miss
    pub fn permission_not_found(key: impl ToString) -> Self {
        RbacError::NotFound {
            kind: EntityKind::Permission,
            key: key.to_string(),
        }
    }

    /// Whether this error is a lookup miss rather than a system failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, RbacError::NotFound { .. })
    }
}

/// Result type for role graph operations
pub type Result<T> = std::result::Result<T, RbacError>;
