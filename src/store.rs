use crate::error::StoreError;
use crate::permission::Permission;
use crate::types::UserId;
use async_trait::async_trait;
use std::sync::Arc;

/// Store interface for resolving a user's effective permissions.
#[async_trait]
pub trait PermissionStore {
    /// Returns the distinct permissions granted to a user through all of their roles.
    ///
    /// A user without roles yields an empty list, not an error.
    async fn resolve_permissions(
        &self,
        user: UserId,
    ) -> std::result::Result<Vec<Permission>, StoreError>;
}

/// Store interface for role membership.
#[async_trait]
pub trait RoleStore {
    /// Returns the names of roles assigned to a user, sorted alphabetically.
    async fn resolve_roles(&self, user: UserId) -> std::result::Result<Vec<String>, StoreError>;

    /// Returns whether the user currently holds the named role.
    async fn role_exists(&self, user: UserId, role: &str)
    -> std::result::Result<bool, StoreError>;

    /// Assigns a role to a user. Assigning an already held role succeeds.
    async fn upsert_role_assignment(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<(), StoreError>;

    /// Removes a role from a user. Removing an absent role succeeds.
    async fn delete_role_assignment(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<(), StoreError>;
}

/// Composite store trait.
pub trait Store: PermissionStore + RoleStore + Send + Sync {}

impl<T> Store for T where T: PermissionStore + RoleStore + Send + Sync {}

#[async_trait]
impl<T> PermissionStore for Arc<T>
where
    T: PermissionStore + Send + Sync + ?Sized,
{
    async fn resolve_permissions(
        &self,
        user: UserId,
    ) -> std::result::Result<Vec<Permission>, StoreError> {
        (**self).resolve_permissions(user).await
    }
}

#[async_trait]
impl<T> RoleStore for Arc<T>
where
    T: RoleStore + Send + Sync + ?Sized,
{
    async fn resolve_roles(&self, user: UserId) -> std::result::Result<Vec<String>, StoreError> {
        (**self).resolve_roles(user).await
    }

    async fn role_exists(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<bool, StoreError> {
        (**self).role_exists(user, role).await
    }

    async fn upsert_role_assignment(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<(), StoreError> {
        (**self).upsert_role_assignment(user, role).await
    }

    async fn delete_role_assignment(
        &self,
        user: UserId,
        role: &str,
    ) -> std::result::Result<(), StoreError> {
        (**self).delete_role_assignment(user, role).await
    }
}
