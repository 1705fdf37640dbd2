//! # CretoAI Role Graph Engine
//!
//! Role-based access control over an inheritance graph of roles.
//!
//! ## Features
//!
//! - **Three inheritance sources**: explicit parent/child edges, dot-path
//!   role names (`admin.billing` inherits `admin` and `billing`) and suffix
//!   wildcards (`admin.*`)
//! - **Cycle-safe resolution** with an optional per-call deadline
//! - **Per-principal permission cache** with generation-guarded invalidation
//! - **Async-first design** using Tokio runtime
//! - **Pluggable storage**: in-memory, or PostgreSQL behind the `postgres` feature
//!
//! ## Example
//!
//! ```rust
//! use cretoai_rbac::{NewPermission, NewRole, RbacEngine};
//! use cretoai_rbac::store::InMemoryRoleGraphStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = RbacEngine::with_defaults(Arc::new(InMemoryRoleGraphStore::new()));
//!
//!     engine.create_role(NewRole::new("admin")).await?;
//!     engine.create_role(NewRole::new("editor")).await?;
//!     engine.create_permission(NewPermission::new("publish")).await?;
//!
//!     engine.assign_child("admin", "editor").await?;
//!     engine.grant_to_role("editor", "publish").await?;
//!     engine.assign_role("user:alice", ["admin"]).await?;
//!
//!     assert!(engine.has_role("user:alice", "editor").await?);
//!     assert!(engine.can("user:alice", "publish").await?);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::RbacConfig;
pub use engine::{
    AccessDecision, AccessRequirement, DecisionReason, GraphChange, RbacEngine,
};
pub use error::{EntityKind, RbacError, Result};
pub use store::RoleGraphStore;
pub use types::{
    EffectiveAccess, NewPermission, NewRole, Permission, PermissionId, PermissionRef,
    PermissionSet, PrincipalId, Role, RoleId, RoleRef, RoleSet,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
