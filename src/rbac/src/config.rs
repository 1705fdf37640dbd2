//! Engine configuration loading and validation

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RbacConfig {
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub resolver: ResolverSection,
}

/// Pass-through settings for the role graph store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSection {
    /// Connection or namespace the store should use
    #[serde(default = "default_connection")]
    pub connection: String,

    #[serde(default)]
    pub tables: TableNames,
}

/// Table (or collection) identifiers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableNames {
    #[serde(default = "default_roles_table")]
    pub roles: String,
    #[serde(default = "default_permissions_table")]
    pub permissions: String,
    #[serde(default = "default_user_roles_table")]
    pub user_roles: String,
    #[serde(default = "default_user_permissions_table")]
    pub user_permissions: String,
    #[serde(default = "default_role_inherits_table")]
    pub role_inherits: String,
    #[serde(default = "default_role_wildcards_table")]
    pub role_wildcards: String,
    #[serde(default = "default_role_permissions_table")]
    pub role_permissions: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of cached principals
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Entry time-to-live; 0 disables expiry
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverSection {
    /// Per-resolution deadline in milliseconds
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    /// Reject inheritance edges that would close a cycle
    #[serde(default)]
    pub reject_cycles: bool,
}

// Default value functions
fn default_true() -> bool { true }
fn default_connection() -> String { "default".to_string() }
fn default_roles_table() -> String { "roles".to_string() }
fn default_permissions_table() -> String { "permissions".to_string() }
fn default_user_roles_table() -> String { "user_roles".to_string() }
fn default_user_permissions_table() -> String { "user_permissions".to_string() }
fn default_role_inherits_table() -> String { "role_inherits".to_string() }
fn default_role_wildcards_table() -> String { "role_wildcards".to_string() }
fn default_role_permissions_table() -> String { "role_permissions".to_string() }
fn default_cache_capacity() -> usize { 10_000 }
fn default_cache_ttl() -> u64 { 300 }

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            tables: TableNames::default(),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            roles: default_roles_table(),
            permissions: default_permissions_table(),
            user_roles: default_user_roles_table(),
            user_permissions: default_user_permissions_table(),
            role_inherits: default_role_inherits_table(),
            role_wildcards: default_role_wildcards_table(),
            role_permissions: default_role_permissions_table(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl TableNames {
    fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("roles", &self.roles),
            ("permissions", &self.permissions),
            ("user_roles", &self.user_roles),
            ("user_permissions", &self.user_permissions),
            ("role_inherits", &self.role_inherits),
            ("role_wildcards", &self.role_wildcards),
            ("role_permissions", &self.role_permissions),
        ]
    }
}

/// Names interpolated into SQL must match this pattern
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn is_identifier(name: &str) -> Result<bool> {
    let pattern = Regex::new(IDENTIFIER_PATTERN).context("Invalid identifier pattern")?;
    Ok(pattern.is_match(name))
}

impl StoreSection {
    /// Check the connection and every table name are plain identifiers
    /// and that no table name repeats
    pub fn validate(&self) -> Result<()> {
        if self.connection.trim().is_empty() {
            anyhow::bail!("Store connection must not be empty");
        }
        if !is_identifier(&self.connection)? {
            anyhow::bail!(
                "Store connection '{}' must match {}",
                self.connection,
                IDENTIFIER_PATTERN
            );
        }

        let mut seen = HashSet::new();
        for (key, table) in self.tables.all() {
            if table.trim().is_empty() {
                anyhow::bail!("Table name for '{}' must not be empty", key);
            }
            if !is_identifier(table)? {
                anyhow::bail!(
                    "Table name '{}' for '{}' must match {}",
                    table,
                    key,
                    IDENTIFIER_PATTERN
                );
            }
            if !seen.insert(table) {
                anyhow::bail!("Table name '{}' is used more than once", table);
            }
        }

        Ok(())
    }
}

impl CacheSection {
    /// TTL as a duration, `None` when expiry is disabled
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

impl ResolverSection {
    /// Deadline as a duration
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

impl RbacConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .context("Failed to read configuration file")?;

        let config: RbacConfig = toml::from_str(&contents)
            .context("Failed to parse configuration file")?;

        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults overlaid with environment variables
    ///
    /// Recognized variables:
    /// - `RBAC_CONNECTION` - store connection/namespace
    /// - `RBAC_CACHE_ENABLED` - `true`/`false`
    /// - `RBAC_CACHE_CAPACITY` - maximum cached principals
    /// - `RBAC_CACHE_TTL` - cache TTL in seconds
    /// - `RBAC_RESOLVE_DEADLINE_MS` - per-resolution deadline
    pub fn from_env() -> Result<Self> {
        let mut config = RbacConfig::default();

        if let Ok(connection) = std::env::var("RBAC_CONNECTION") {
            config.store.connection = connection;
        }
        if let Ok(enabled) = std::env::var("RBAC_CACHE_ENABLED") {
            config.cache.enabled = enabled
                .parse()
                .with_context(|| format!("Invalid RBAC_CACHE_ENABLED: {}", enabled))?;
        }
        if let Ok(capacity) = std::env::var("RBAC_CACHE_CAPACITY") {
            config.cache.capacity = capacity
                .parse()
                .with_context(|| format!("Invalid RBAC_CACHE_CAPACITY: {}", capacity))?;
        }
        if let Ok(ttl) = std::env::var("RBAC_CACHE_TTL") {
            config.cache.ttl_secs = ttl
                .parse()
                .with_context(|| format!("Invalid RBAC_CACHE_TTL: {}", ttl))?;
        }
        if let Ok(deadline) = std::env::var("RBAC_RESOLVE_DEADLINE_MS") {
            config.resolver.deadline_ms = Some(
                deadline
                    .parse()
                    .with_context(|| format!("Invalid RBAC_RESOLVE_DEADLINE_MS: {}", deadline))?,
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;

        if self.cache.enabled && self.cache.capacity == 0 {
            anyhow::bail!("Cache capacity must be greater than zero when the cache is enabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RbacConfig::default();
        config.validate().unwrap();
        assert_eq!(config.store.tables.role_wildcards, "role_wildcards");
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(300)));
        assert!(config.resolver.deadline().is_none());
        assert!(!config.resolver.reject_cycles);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[store]
connection = "user"

[store.tables]
roles = "acl_roles"

[cache]
ttl_secs = 0

[resolver]
deadline_ms = 250
"#
        )
        .unwrap();

        let config = RbacConfig::load(file.path()).unwrap();
        assert_eq!(config.store.connection, "user");
        assert_eq!(config.store.tables.roles, "acl_roles");
        assert_eq!(config.store.tables.permissions, "permissions");
        assert!(config.cache.enabled);
        assert!(config.cache.ttl().is_none());
        assert_eq!(config.resolver.deadline(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_duplicate_table_names_rejected() {
        let mut config = RbacConfig::default();
        config.store.tables.user_roles = "roles".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_non_identifier_names_rejected() {
        for bad in ["roles; DROP TABLE roles", "acl-roles", "acl.roles", "1roles", "roles "] {
            let mut config = RbacConfig::default();
            config.store.tables.roles = bad.to_string();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("must match"), "accepted {:?}", bad);
        }

        for bad in ["my schema", "public.x", "x\"; --"] {
            let mut config = RbacConfig::default();
            config.store.connection = bad.to_string();
            assert!(config.validate().is_err(), "accepted connection {:?}", bad);
        }

        let mut config = RbacConfig::default();
        config.store.connection = "tenant_7".to_string();
        config.store.tables.roles = "_Acl_Roles2".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = RbacConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());

        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }
}
