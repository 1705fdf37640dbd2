//! Suffix-wildcard role matching
//!
//! A wildcard edge carries a pattern such as `admin.*`. The trailing `*` is
//! stripped and every role whose slug starts with the remainder matches.
//! Matching is an exact, case-sensitive prefix test, not a glob.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RbacError, Result};
use crate::store::RoleGraphStore;
use crate::types::Role;

/// Wildcard marker that terminates every pattern
pub const WILDCARD: char = '*';

/// Prefix a pattern matches, or `None` when the pattern has no trailing `*`
pub fn pattern_prefix(pattern: &str) -> Option<&str> {
    pattern.strip_suffix(WILDCARD)
}

/// A validated wildcard pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WildcardPattern(String);

impl WildcardPattern {
    /// Parse a pattern, rejecting anything that does not end in `*`
    pub fn parse(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if pattern_prefix(&pattern).is_none() {
            return Err(RbacError::InvalidInput(format!(
                "Wildcard pattern '{}' must end with '{}'",
                pattern, WILDCARD
            )));
        }
        Ok(Self(pattern))
    }

    /// The literal prefix (pattern without its trailing `*`)
    pub fn prefix(&self) -> &str {
        &self.0[..self.0.len() - WILDCARD.len_utf8()]
    }

    /// Whether a slug falls under this pattern
    pub fn matches(&self, slug: &str) -> bool {
        slug.starts_with(self.prefix())
    }

    /// The raw pattern
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WildcardPattern {
    type Error = RbacError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<WildcardPattern> for String {
    fn from(pattern: WildcardPattern) -> Self {
        pattern.0
    }
}

/// Evaluates wildcard patterns against the current role set
///
/// Patterns are evaluated dynamically on every call, so roles created after
/// the wildcard edge are picked up without any rematerialization.
#[derive(Clone)]
pub struct WildcardMatcher {
    store: Arc<dyn RoleGraphStore>,
}

impl WildcardMatcher {
    /// Create a matcher over a store
    pub fn new(store: Arc<dyn RoleGraphStore>) -> Self {
        Self { store }
    }

    /// Every role matched by `pattern`
    ///
    /// A pattern without a trailing `*` matches nothing. The bare pattern `*`
    /// matches every role.
    pub async fn matches(&self, pattern: &str) -> Result<Vec<Role>> {
        match pattern_prefix(pattern) {
            Some(prefix) => self.store.roles_with_prefix(prefix).await,
            None => Ok(Vec::new()),
        }
    }
}
