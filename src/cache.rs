use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::permission::PermissionSet;
use crate::types::UserId;

/// Per-user cache entry. Replaced wholesale on every reload.
#[derive(Debug, Clone)]
struct CachedPermissionSet {
    permissions: PermissionSet,
    loaded_at: Instant,
}

impl CachedPermissionSet {
    fn is_valid(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.loaded_at) < ttl
    }
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<UserId, CachedPermissionSet>,
    ttl: Duration,
    enabled: bool,
    generation: u64,
}

/// Snapshot taken before a store load, checked again when the result is stored.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoadTicket {
    generation: u64,
}

/// Outcome of storing a freshly loaded permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    Stored,
    Disabled,
    Stale,
}

/// Process-local permission cache keyed by user.
///
/// Entries, TTL, the enabled flag and the invalidation generation all live
/// under one reader/writer lock. Lookups take the shared mode; fills,
/// invalidations and sweeps take the exclusive mode. No store I/O happens
/// while the lock is held.
#[derive(Debug)]
pub(crate) struct PermissionCache {
    state: RwLock<CacheState>,
    reject_stale_fills: bool,
}

impl PermissionCache {
    pub(crate) fn new(ttl: Duration, enabled: bool, reject_stale_fills: bool) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                ttl,
                enabled,
                generation: 0,
            }),
            reject_stale_fills,
        }
    }

    // Entries are only ever replaced whole, so a poisoned lock still guards a
    // consistent map.
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn enabled(&self) -> bool {
        self.read().enabled
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.write().enabled = enabled;
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.read().ttl
    }

    pub(crate) fn set_ttl(&self, ttl: Duration) {
        self.write().ttl = ttl;
    }

    pub(crate) fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Answers `permission` for `user` from a present, unexpired entry.
    ///
    /// Returns `None` when caching is disabled or the entry is missing or stale.
    pub(crate) fn lookup(&self, user: &UserId, permission: &str) -> Option<bool> {
        let now = Instant::now();
        let guard = self.read();
        if !guard.enabled {
            return None;
        }
        let entry = guard.entries.get(user)?;
        if !entry.is_valid(guard.ttl, now) {
            return None;
        }
        Some(entry.permissions.contains(permission))
    }

    pub(crate) fn ticket(&self) -> LoadTicket {
        LoadTicket {
            generation: self.read().generation,
        }
    }

    /// Replaces the entry for `user` with a freshly loaded set.
    pub(crate) fn fill(&self, user: UserId, permissions: PermissionSet, ticket: LoadTicket) -> Fill {
        let mut guard = self.write();
        if !guard.enabled {
            return Fill::Disabled;
        }
        if self.reject_stale_fills && guard.generation != ticket.generation {
            return Fill::Stale;
        }
        guard.entries.insert(
            user,
            CachedPermissionSet {
                permissions,
                loaded_at: Instant::now(),
            },
        );
        Fill::Stored
    }

    pub(crate) fn invalidate(&self, user: &UserId) -> bool {
        let mut guard = self.write();
        guard.generation = guard.generation.wrapping_add(1);
        guard.entries.remove(user).is_some()
    }

    pub(crate) fn invalidate_all(&self) -> usize {
        let mut guard = self.write();
        guard.generation = guard.generation.wrapping_add(1);
        let removed = guard.entries.len();
        guard.entries.clear();
        removed
    }

    /// Removes every entry whose age has reached the TTL. Returns the number removed.
    pub(crate) fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.write();
        let ttl = guard.ttl;
        let before = guard.entries.len();
        guard.entries.retain(|_, entry| entry.is_valid(ttl, now));
        before - guard.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Permission;

    fn user() -> UserId {
        UserId::parse("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap()
    }

    fn set(names: &[&str]) -> PermissionSet {
        names
            .iter()
            .map(|name| Permission::new(*name, "users", "read"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_should_miss_once_ttl_elapses() {
        let cache = PermissionCache::new(Duration::from_secs(60), true, false);
        let user = user();
        let ticket = cache.ticket();

        assert_eq!(cache.fill(user, set(&["user.read"]), ticket), Fill::Stored);
        assert_eq!(cache.lookup(&user, "user.read"), Some(true));
        assert_eq!(cache.lookup(&user, "user.delete"), Some(false));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.lookup(&user, "user.read"), Some(true));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.lookup(&user, "user.read"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn shortening_ttl_should_apply_to_existing_entries() {
        let cache = PermissionCache::new(Duration::from_secs(300), true, false);
        let user = user();
        cache.fill(user, set(&["user.read"]), cache.ticket());

        tokio::time::advance(Duration::from_secs(30)).await;
        cache.set_ttl(Duration::from_secs(10));

        assert_eq!(cache.lookup(&user, "user.read"), None);
    }

    #[test]
    fn disabled_cache_should_neither_answer_nor_store() {
        let cache = PermissionCache::new(Duration::from_secs(60), false, false);
        let user = user();

        assert_eq!(cache.fill(user, set(&["user.read"]), cache.ticket()), Fill::Disabled);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.lookup(&user, "user.read"), None);
    }

    #[test]
    fn stale_fill_should_be_rejected_only_when_hardening_enabled() {
        let user = user();

        let strict = PermissionCache::new(Duration::from_secs(60), true, true);
        let ticket = strict.ticket();
        strict.invalidate(&user);
        assert_eq!(strict.fill(user, set(&["user.read"]), ticket), Fill::Stale);
        assert_eq!(strict.len(), 0);

        let compatible = PermissionCache::new(Duration::from_secs(60), true, false);
        let ticket = compatible.ticket();
        compatible.invalidate(&user);
        assert_eq!(compatible.fill(user, set(&["user.read"]), ticket), Fill::Stored);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_should_remove_only_expired_entries() {
        let cache = PermissionCache::new(Duration::from_secs(60), true, false);
        let old = user();
        let fresh = UserId::parse("16fd2706-8baf-433b-82eb-8c7fada847da").unwrap();

        cache.fill(old, set(&["user.read"]), cache.ticket());
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.fill(fresh, set(&["user.read"]), cache.ticket());
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&fresh, "user.read"), Some(true));
    }

    #[test]
    fn invalidate_all_should_clear_every_entry() {
        let cache = PermissionCache::new(Duration::from_secs(60), true, false);
        cache.fill(user(), set(&["user.read"]), cache.ticket());
        cache.fill(
            UserId::parse("16fd2706-8baf-433b-82eb-8c7fada847da").unwrap(),
            set(&["user.read"]),
            cache.ticket(),
        );

        assert_eq!(cache.invalidate_all(), 2);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.invalidate_all(), 0);
    }
}
