use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A named capability over a resource/action pair.
///
/// Identity is the `name`; `resource` and `action` are descriptive metadata
/// and take no part in equality, hashing or ordering.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permission {
    name: String,
    resource: String,
    action: String,
}

impl Permission {
    /// Creates a permission.
    pub fn new(
        name: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Returns the permission name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resource the permission applies to.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the action the permission grants.
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Permission {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Permission {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

// Hash and Eq only look at `name`, so lookups by `&str` are consistent.
impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Immutable set of permissions, unique by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet {
    inner: HashSet<Permission>,
}

impl PermissionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a permission with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    /// Returns the number of distinct permissions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true when the set holds no permissions.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates permissions in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.inner.iter()
    }

    /// Returns permission names sorted alphabetically.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.iter().map(Permission::name).collect();
        names.sort_unstable();
        names
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut inner = HashSet::new();
        for permission in iter {
            // First occurrence of a name wins.
            if !inner.contains(permission.name()) {
                inner.insert(permission);
            }
        }
        Self { inner }
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(value: Vec<Permission>) -> Self {
        value.into_iter().collect()
    }
}
