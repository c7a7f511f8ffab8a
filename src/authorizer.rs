use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{Fill, PermissionCache};
use crate::config::AuthorizerConfig;
use crate::error::{Error, Result};
use crate::permission::PermissionSet;
use crate::store::Store;
use crate::types::UserId;

/// Role/permission authorizer with a per-user permission cache.
///
/// Permission checks are answered from a cached copy of the user's complete
/// permission set while it is younger than the TTL. Role queries always go to
/// the store. Role mutations invalidate the affected user's entry.
#[derive(Debug)]
pub struct Authorizer<S> {
    store: S,
    cache: PermissionCache,
}

/// Builder for [`Authorizer`].
#[derive(Debug)]
pub struct AuthorizerBuilder<S> {
    store: S,
    cache_ttl: Duration,
    cache_enabled: bool,
    reject_stale_fills: bool,
}

impl<S> AuthorizerBuilder<S> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self::from_config(store, &AuthorizerConfig::default())
    }

    /// Creates a builder seeded from loaded settings.
    pub fn from_config(store: S, config: &AuthorizerConfig) -> Self {
        Self {
            store,
            cache_ttl: config.cache_ttl,
            cache_enabled: config.cache_enabled,
            reject_stale_fills: false,
        }
    }

    /// Sets how long a loaded permission set stays valid.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Enables or disables the permission cache.
    pub fn cache_enabled(mut self, on: bool) -> Self {
        self.cache_enabled = on;
        self
    }

    /// Drops cache fills whose load started before an invalidation.
    ///
    /// Off by default. Without it a slow load racing a role change can put
    /// pre-change permissions back into the cache until the TTL runs out.
    pub fn reject_stale_fills(mut self, on: bool) -> Self {
        self.reject_stale_fills = on;
        self
    }

    /// Builds the authorizer.
    pub fn build(self) -> Authorizer<S> {
        Authorizer {
            store: self.store,
            cache: PermissionCache::new(
                self.cache_ttl,
                self.cache_enabled,
                self.reject_stale_fills,
            ),
        }
    }
}

impl<S> Authorizer<S> {
    /// Sets the cache TTL. Applies to existing entries on their next lookup.
    pub fn set_cache_ttl(&self, ttl: Duration) {
        self.cache.set_ttl(ttl);
    }

    /// Returns the current cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    /// Turns caching on.
    pub fn enable_cache(&self) {
        self.cache.set_enabled(true);
    }

    /// Turns caching off. Existing entries stay in memory but are not consulted.
    pub fn disable_cache(&self) {
        self.cache.set_enabled(false);
    }

    /// Returns whether lookups and fills use the cache.
    pub fn cache_enabled(&self) -> bool {
        self.cache.enabled()
    }

    /// Returns the number of users with a cache entry, expired or not.
    pub fn cached_users(&self) -> usize {
        self.cache.len()
    }

    /// Drops the cache entry for one user.
    pub fn invalidate_user(&self, user: &UserId) {
        if self.cache.invalidate(user) {
            debug!(user_id = %user, "permission cache entry invalidated");
        }
    }

    /// Drops every cache entry.
    pub fn invalidate_all_cache(&self) {
        let removed = self.cache.invalidate_all();
        debug!(removed, "permission cache cleared");
    }

    /// Removes expired entries now. Returns how many were removed.
    pub fn clean_expired_cache(&self) -> usize {
        self.cache.sweep()
    }
}

impl<S> Authorizer<S>
where
    S: Store,
{
    /// Creates an authorizer with default settings.
    pub fn new(store: S) -> Self {
        AuthorizerBuilder::new(store).build()
    }

    /// Checks whether a user holds a permission.
    pub async fn has_permission(&self, user_id: &str, permission: &str) -> Result<bool> {
        let user = UserId::parse(user_id)?;

        if let Some(allowed) = self.cache.lookup(&user, permission) {
            debug!(user_id = %user, permission, allowed, "permission cache hit");
            return Ok(allowed);
        }

        self.load_and_check(user, permission).await
    }

    /// Returns true on the first permission the user holds.
    ///
    /// Names are checked in order; the first error aborts the check.
    pub async fn has_any_permission<I>(&self, user_id: &str, permissions: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for permission in permissions {
            if self.has_permission(user_id, permission.as_ref()).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns false on the first permission the user lacks.
    ///
    /// Names are checked in order; the first error aborts the check.
    pub async fn has_all_permissions<I>(&self, user_id: &str, permissions: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for permission in permissions {
            if !self.has_permission(user_id, permission.as_ref()).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks role membership against the store. Never cached.
    pub async fn has_role(&self, user_id: &str, role: &str) -> Result<bool> {
        let user = UserId::parse(user_id)?;
        self.store
            .role_exists(user, role)
            .await
            .map_err(|source| Error::RoleQueryFailed {
                operation: "check role",
                source,
            })
    }

    /// Returns the user's role names in alphabetical order. Never cached.
    pub async fn user_roles(&self, user_id: &str) -> Result<Vec<String>> {
        let user = UserId::parse(user_id)?;
        self.store
            .resolve_roles(user)
            .await
            .map_err(|source| Error::RoleQueryFailed {
                operation: "get user roles",
                source,
            })
    }

    /// Assigns a role and invalidates the user's cached permissions.
    pub async fn assign_role(&self, user_id: &str, role: &str) -> Result<()> {
        let user = UserId::parse(user_id)?;
        self.store
            .upsert_role_assignment(user, role)
            .await
            .map_err(|source| {
                warn!(user_id = %user, role, error = %source, "role assignment failed");
                Error::RoleMutationFailed {
                    operation: "assign role",
                    source,
                }
            })?;
        self.invalidate_user(&user);
        Ok(())
    }

    /// Removes a role and invalidates the user's cached permissions.
    pub async fn remove_role(&self, user_id: &str, role: &str) -> Result<()> {
        let user = UserId::parse(user_id)?;
        self.store
            .delete_role_assignment(user, role)
            .await
            .map_err(|source| {
                warn!(user_id = %user, role, error = %source, "role removal failed");
                Error::RoleMutationFailed {
                    operation: "remove role",
                    source,
                }
            })?;
        self.invalidate_user(&user);
        Ok(())
    }

    /// Loads the user's permission set, answers `permission` from it and
    /// hands the set to the cache.
    async fn load_and_check(&self, user: UserId, permission: &str) -> Result<bool> {
        let ticket = self.cache.ticket();
        let loaded = self.store.resolve_permissions(user).await.map_err(|source| {
            warn!(user_id = %user, error = %source, "permission load failed");
            Error::PermissionLoadFailed(source)
        })?;
        let permissions: PermissionSet = loaded.into_iter().collect();
        let allowed = permissions.contains(permission);
        let count = permissions.len();

        match self.cache.fill(user, permissions, ticket) {
            Fill::Stored => debug!(user_id = %user, count, "permission cache filled"),
            Fill::Stale => {
                warn!(user_id = %user, "discarding permissions loaded before invalidation")
            }
            Fill::Disabled => {}
        }
        Ok(allowed)
    }
}
