//! Core role graph types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Surrogate role identifier
pub type RoleId = i64;

/// Surrogate permission identifier
pub type PermissionId = i64;

/// Principal identifier (e.g., "user:42", "user:alice@example.com")
pub type PrincipalId = String;

/// A named node in the inheritance graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    /// Surrogate key assigned by the store
    pub id: RoleId,

    /// Unique, immutable identifier; dot-delimited slugs inherit their segments
    pub slug: String,

    /// Display name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Role {
    /// Dot-separated segments of the slug ("admin.billing" -> ["admin", "billing"])
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.slug.split('.').filter(|segment| !segment.is_empty())
    }
}

/// Attributes for a role that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    /// Unique slug
    pub slug: String,

    /// Display name (defaults to the slug)
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewRole {
    /// Create a role definition whose display name equals its slug
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            name: slug.clone(),
            slug,
            description: None,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An atomic named capability
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Surrogate key assigned by the store
    pub id: PermissionId,

    /// Unique name (e.g., "publish", "billing.refund")
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Attributes for a permission that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    /// Unique name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewPermission {
    /// Create a permission definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Reference to a role, resolved once at the API boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRef {
    /// Already-loaded role
    Role(Role),
    /// Lookup by surrogate id
    Id(RoleId),
    /// Lookup by slug
    Slug(String),
}

impl RoleRef {
    /// Human readable key used in errors and logs
    pub fn key(&self) -> String {
        match self {
            RoleRef::Role(role) => role.slug.clone(),
            RoleRef::Id(id) => id.to_string(),
            RoleRef::Slug(slug) => slug.clone(),
        }
    }
}

impl From<Role> for RoleRef {
    fn from(role: Role) -> Self {
        RoleRef::Role(role)
    }
}

impl From<&Role> for RoleRef {
    fn from(role: &Role) -> Self {
        RoleRef::Role(role.clone())
    }
}

impl From<RoleId> for RoleRef {
    fn from(id: RoleId) -> Self {
        RoleRef::Id(id)
    }
}

impl From<&str> for RoleRef {
    fn from(slug: &str) -> Self {
        RoleRef::Slug(slug.to_string())
    }
}

impl From<String> for RoleRef {
    fn from(slug: String) -> Self {
        RoleRef::Slug(slug)
    }
}

impl From<&String> for RoleRef {
    fn from(slug: &String) -> Self {
        RoleRef::Slug(slug.clone())
    }
}

/// Reference to a permission, resolved once at the API boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRef {
    /// Already-loaded permission
    Permission(Permission),
    /// Lookup by surrogate id
    Id(PermissionId),
    /// Lookup by name
    Name(String),
}

impl PermissionRef {
    /// Human readable key used in errors and logs
    pub fn key(&self) -> String {
        match self {
            PermissionRef::Permission(permission) => permission.name.clone(),
            PermissionRef::Id(id) => id.to_string(),
            PermissionRef::Name(name) => name.clone(),
        }
    }
}

impl From<Permission> for PermissionRef {
    fn from(permission: Permission) -> Self {
        PermissionRef::Permission(permission)
    }
}

impl From<&Permission> for PermissionRef {
    fn from(permission: &Permission) -> Self {
        PermissionRef::Permission(permission.clone())
    }
}

impl From<PermissionId> for PermissionRef {
    fn from(id: PermissionId) -> Self {
        PermissionRef::Id(id)
    }
}

impl From<&str> for PermissionRef {
    fn from(name: &str) -> Self {
        PermissionRef::Name(name.to_string())
    }
}

impl From<String> for PermissionRef {
    fn from(name: String) -> Self {
        PermissionRef::Name(name)
    }
}

/// Set of roles keyed by id, iterated in id order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    roles: BTreeMap<RoleId, Role>,
}

impl RoleSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a role; returns false if a role with the same id was present
    pub fn insert(&mut self, role: Role) -> bool {
        if self.roles.contains_key(&role.id) {
            return false;
        }
        self.roles.insert(role.id, role);
        true
    }

    /// Whether the set holds the role id
    pub fn contains_id(&self, id: RoleId) -> bool {
        self.roles.contains_key(&id)
    }

    /// Whether the set holds a role with the slug
    pub fn contains_slug(&self, slug: &str) -> bool {
        self.roles.values().any(|role| role.slug == slug)
    }

    /// Whether the set holds the role
    pub fn contains(&self, role: &Role) -> bool {
        self.contains_id(role.id)
    }

    /// Get a role by id
    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }

    /// Number of roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Iterate roles in id order
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Role ids in ascending order
    pub fn ids(&self) -> Vec<RoleId> {
        self.roles.keys().copied().collect()
    }

    /// Sorted role slugs
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.roles.values().map(|r| r.slug.clone()).collect();
        slugs.sort();
        slugs
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::new();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl IntoIterator for RoleSet {
    type Item = Role;
    type IntoIter = std::collections::btree_map::IntoValues<RoleId, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.roles.into_values()
    }
}

/// Set of permissions keyed by id, iterated in id order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: BTreeMap<PermissionId, Permission>,
}

impl PermissionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a permission; returns false if one with the same id was present
    pub fn insert(&mut self, permission: Permission) -> bool {
        if self.permissions.contains_key(&permission.id) {
            return false;
        }
        self.permissions.insert(permission.id, permission);
        true
    }

    /// Union another set into this one
    pub fn extend(&mut self, other: impl IntoIterator<Item = Permission>) {
        for permission in other {
            self.insert(permission);
        }
    }

    /// Whether the set holds the permission id
    pub fn contains_id(&self, id: PermissionId) -> bool {
        self.permissions.contains_key(&id)
    }

    /// Whether the set holds a permission with the name
    pub fn contains_name(&self, name: &str) -> bool {
        self.permissions.values().any(|p| p.name == name)
    }

    /// Number of permissions
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Iterate permissions in id order
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    /// Sorted permission names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.permissions.values().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = PermissionSet::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::collections::btree_map::IntoValues<PermissionId, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.permissions.into_values()
    }
}

/// A principal's effective roles and permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAccess {
    /// Transitive closure of the principal's direct roles
    pub roles: RoleSet,

    /// Direct permissions plus the permissions of every resolved role
    pub permissions: PermissionSet,
}
