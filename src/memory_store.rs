use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::permission::Permission;
use crate::store::{PermissionStore, RoleStore};
use crate::types::UserId;

/// In-memory store implementation for tests and demos.
///
/// Models the `roles`, `role_permissions` and `user_roles` relations. Only
/// roles known through [`MemoryStore::add_role`] or
/// [`MemoryStore::add_role_permission`] can be assigned.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    role_permissions: RwLock<HashMap<String, HashSet<Permission>>>,
    user_roles: RwLock<HashMap<UserId, BTreeSet<String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a role without permissions.
    pub fn add_role(&self, role: impl Into<String>) {
        let mut guard = self.inner.role_permissions.write().expect("poisoned lock");
        guard.entry(role.into()).or_default();
    }

    /// Grants a permission to a role, declaring the role if needed.
    pub fn add_role_permission(&self, role: impl Into<String>, permission: Permission) {
        let mut guard = self.inner.role_permissions.write().expect("poisoned lock");
        guard.entry(role.into()).or_default().insert(permission);
    }

    /// Revokes a permission from a role.
    pub fn remove_role_permission(&self, role: &str, permission: &str) {
        let mut guard = self.inner.role_permissions.write().expect("poisoned lock");
        if let Some(perms) = guard.get_mut(role) {
            perms.remove(permission);
        }
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn resolve_permissions(
        &self,
        user: UserId,
    ) -> std::result::Result<Vec<Permission>, crate::StoreError> {
        let roles = self.inner.user_roles.read().expect("poisoned lock");
        let role_permissions = self.inner.role_permissions.read().expect("poisoned lock");

        let mut distinct: HashSet<&Permission> = HashSet::new();
        for role in roles.get(&user).into_iter().flatten() {
            if let Some(perms) = role_permissions.get(role) {
                distinct.extend(perms);
            }
        }

        let mut permissions: Vec<Permission> = distinct.into_iter().cloned().collect();
        permissions.sort();
        Ok(permissions)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn resolve_roles(
        &self,
        user: UserId,
    ) -> std::result::Result<Vec<String>, crate::StoreError> {
        let guard = self.inner.user_roles.read().expect("poisoned lock");
        Ok(guard
            .get(&user)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn role_exists(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<bool, crate::StoreError> {
        let guard = self.inner.user_roles.read().expect("poisoned lock");
        Ok(guard.get(&user).is_some_and(|roles| roles.contains(role)))
    }

    async fn upsert_role_assignment(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<(), crate::StoreError> {
        let known = self
            .inner
            .role_permissions
            .read()
            .expect("poisoned lock")
            .contains_key(role);
        // Unknown roles match no row to insert.
        if known {
            let mut guard = self.inner.user_roles.write().expect("poisoned lock");
            guard.entry(user).or_default().insert(role.to_string());
        }
        Ok(())
    }

    async fn delete_role_assignment(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<(), crate::StoreError> {
        let mut guard = self.inner.user_roles.write().expect("poisoned lock");
        if let Some(roles) = guard.get_mut(&user) {
            roles.remove(role);
            if roles.is_empty() {
                guard.remove(&user);
            }
        }
        Ok(())
    }
}
