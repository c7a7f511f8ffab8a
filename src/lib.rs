//! Cached role/permission authorization.
//!
//! [`Authorizer`] answers "does user U hold permission P" from an in-memory,
//! per-user copy of the user's complete permission set, loaded from a
//! pluggable async [`Store`] and valid for a configurable TTL. Role queries
//! always hit the store; role mutations go through the store and invalidate
//! the affected user's cache entry.
//!
//! # Examples
//!
//! Basic authorization flow using the in-memory store (enable `memory-store`):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # futures::executor::block_on(async {
//! use rs_authz_cache::{Authorizer, MemoryStore, Permission};
//! let store = MemoryStore::new();
//! store.add_role_permission("user", Permission::new("user.read", "users", "read"));
//! let authorizer = Authorizer::new(store);
//! let user = "67e55044-10b1-426f-9247-bb680e5fe0c8";
//! authorizer.assign_role(user, "user").await?;
//! assert!(authorizer.has_permission(user, "user.read").await?);
//! # Ok::<(), rs_authz_cache::Error>(())
//! # });
//! ```
//!
//! Running the background sweep from loaded settings:
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # async fn run() {
//! use rs_authz_cache::{AuthorizerBuilder, AuthorizerConfig, MemoryStore};
//! use std::sync::Arc;
//! let config = AuthorizerConfig::from_env();
//! let authorizer = Arc::new(AuthorizerBuilder::from_config(MemoryStore::new(), &config).build());
//! let (shutdown, signal) = tokio::sync::watch::channel(false);
//! let task = authorizer.spawn_cache_cleanup(config.cleanup_interval, signal);
//! // ...
//! let _ = shutdown.send(true);
//! let _ = task.await;
//! # }
//! ```
#![forbid(unsafe_code)]

mod authorizer;
mod cache;
mod cleanup;
mod config;
mod error;
mod permission;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::authorizer::{Authorizer, AuthorizerBuilder};
pub use crate::cleanup::MAX_CLEANUP_INTERVAL;
pub use crate::config::{
    AuthorizerConfig, DEFAULT_CACHE_TTL, DEFAULT_CLEANUP_INTERVAL, ENV_CACHE_CLEANUP_INTERVAL,
    ENV_CACHE_ENABLED, ENV_CACHE_TTL, MAX_SETTING_MINUTES,
};
pub use crate::error::{Error, Result, StoreError};
pub use crate::permission::{Permission, PermissionSet};
pub use crate::store::{PermissionStore, RoleStore, Store};
pub use crate::types::UserId;

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
