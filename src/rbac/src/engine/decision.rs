//! Authorization decisions and access requirements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of an authorization check
///
/// A denial is a normal decision, never an error; store failures surface as
/// [`RbacError`](crate::error::RbacError) instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Unique decision ID
    pub id: String,

    /// Principal the decision was made for
    pub principal: String,

    /// Whether access is allowed
    pub allowed: bool,

    /// Reason for the decision
    pub reason: DecisionReason,

    /// Decision timestamp
    pub timestamp: DateTime<Utc>,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AccessDecision {
    /// Create an allow decision
    pub fn allow(principal: impl Into<String>, reason: DecisionReason) -> Self {
        Self::new(principal.into(), true, reason)
    }

    /// Create a deny decision
    pub fn deny(principal: impl Into<String>, reason: DecisionReason) -> Self {
        Self::new(principal.into(), false, reason)
    }

    fn new(principal: String, allowed: bool, reason: DecisionReason) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            principal,
            allowed,
            reason,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Add metadata to the decision
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Reason for an authorization decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionReason {
    /// Every condition held
    Granted,

    /// None of the required roles is in the principal's effective set
    MissingRole { roles: Vec<String> },

    /// The permission exists but is not in the principal's effective set
    MissingPermission { permission: String },

    /// The role name matches no stored role
    UnknownRole { role: String },

    /// The permission name matches no stored permission
    UnknownPermission { permission: String },
}

/// Conditions a principal must meet, typically attached to a route or action
///
/// Both conditions must hold when present. An empty requirement allows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    /// Any one of these roles satisfies the role condition
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Permission the principal must hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

impl AccessRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require any one of `roles`
    pub fn any_role<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Require a single role
    pub fn role(self, role: impl Into<String>) -> Self {
        self.any_role([role])
    }

    /// Require a permission
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }
}
