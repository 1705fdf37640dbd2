//! Role graph traversal
//!
//! Provides the wildcard matcher, the cycle-safe closure resolver and the
//! permission aggregator built on top of it.
//!
//! # Example
//!
//! ```rust
//! use cretoai_rbac::graph::RoleGraphResolver;
//! use cretoai_rbac::store::{InMemoryRoleGraphStore, RoleGraphStore};
//! use cretoai_rbac::NewRole;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryRoleGraphStore::new());
//! let admin = store.insert_role(NewRole::new("admin")).await?;
//! let editor = store.insert_role(NewRole::new("editor")).await?;
//! store.insert_inheritance(admin.id, editor.id).await?;
//!
//! let resolver = RoleGraphResolver::new(store);
//! let resolved = resolver.resolve(vec![admin]).await?;
//! assert_eq!(resolved.slugs(), vec!["admin", "editor"]);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod resolver;
pub mod wildcard;

pub use aggregator::PermissionAggregator;
pub use resolver::RoleGraphResolver;
pub use wildcard::{pattern_prefix, WildcardMatcher, WildcardPattern, WILDCARD};
