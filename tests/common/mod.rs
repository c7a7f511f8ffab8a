#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rs_authz_cache::{Permission, PermissionStore, RoleStore, StoreError, UserId};
use tokio::sync::Notify;

pub const USER: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";
pub const OTHER_USER: &str = "16fd2706-8baf-433b-82eb-8c7fada847da";

/// Routes crate logs to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pauses one permission load after it has read the store state.
#[derive(Clone, Default)]
pub struct LoadGate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
struct State {
    role_permissions: HashMap<String, Vec<Permission>>,
    user_roles: HashMap<UserId, BTreeSet<String>>,
}

/// Store double that counts calls and can inject failures.
#[derive(Default)]
pub struct TestStore {
    state: Mutex<State>,
    gate: Mutex<Option<LoadGate>>,
    permission_loads: AtomicUsize,
    role_queries: AtomicUsize,
    failing_loads: AtomicUsize,
    fail_mutations: AtomicBool,
    fail_role_queries: AtomicBool,
}

impl TestStore {
    /// User `USER` holds role `user` granting `user.read` and `user.update`;
    /// role `admin` additionally grants `user.delete`.
    pub fn seeded() -> Arc<Self> {
        init_tracing();
        let store = Self::default();
        store.grant("user", "user.read");
        store.grant("user", "user.update");
        store.grant("admin", "user.read");
        store.grant("admin", "user.update");
        store.grant("admin", "user.delete");
        store.assign(USER, "user");
        Arc::new(store)
    }

    pub fn grant(&self, role: &str, name: &str) {
        let (resource, action) = name.split_once('.').unwrap_or((name, ""));
        let mut state = self.state.lock().unwrap();
        state
            .role_permissions
            .entry(role.to_string())
            .or_default()
            .push(Permission::new(name, resource, action));
    }

    pub fn assign(&self, user: &str, role: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .user_roles
            .entry(UserId::parse(user).unwrap())
            .or_default()
            .insert(role.to_string());
    }

    pub fn permission_loads(&self) -> usize {
        self.permission_loads.load(Ordering::SeqCst)
    }

    pub fn role_queries(&self) -> usize {
        self.role_queries.load(Ordering::SeqCst)
    }

    pub fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    pub fn fail_mutations(&self, on: bool) {
        self.fail_mutations.store(on, Ordering::SeqCst);
    }

    pub fn fail_role_queries(&self, on: bool) {
        self.fail_role_queries.store(on, Ordering::SeqCst);
    }

    pub fn gate_next_load(&self) -> LoadGate {
        let gate = LoadGate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn roles_of(&self, user: UserId) -> Result<BTreeSet<String>, StoreError> {
        self.role_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_role_queries.load(Ordering::SeqCst) {
            return Err("statement timeout".into());
        }
        let state = self.state.lock().unwrap();
        Ok(state.user_roles.get(&user).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PermissionStore for TestStore {
    async fn resolve_permissions(&self, user: UserId) -> Result<Vec<Permission>, StoreError> {
        self.permission_loads.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err("connection refused".into());
        }

        let snapshot: Vec<Permission> = {
            let state = self.state.lock().unwrap();
            let mut out: Vec<Permission> = Vec::new();
            for role in state.user_roles.get(&user).into_iter().flatten() {
                for perm in state.role_permissions.get(role).into_iter().flatten() {
                    if !out.contains(perm) {
                        out.push(perm.clone());
                    }
                }
            }
            out
        };

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl RoleStore for TestStore {
    async fn resolve_roles(&self, user: UserId) -> Result<Vec<String>, StoreError> {
        Ok(self.roles_of(user)?.into_iter().collect())
    }

    async fn role_exists(&self, user: UserId, role: &str) -> Result<bool, StoreError> {
        Ok(self.roles_of(user)?.contains(role))
    }

    async fn upsert_role_assignment(&self, user: UserId, role: &str) -> Result<(), StoreError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err("deadlock detected".into());
        }
        let mut state = self.state.lock().unwrap();
        state
            .user_roles
            .entry(user)
            .or_default()
            .insert(role.to_string());
        Ok(())
    }

    async fn delete_role_assignment(&self, user: UserId, role: &str) -> Result<(), StoreError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err("deadlock detected".into());
        }
        let mut state = self.state.lock().unwrap();
        if let Some(roles) = state.user_roles.get_mut(&user) {
            roles.remove(role);
        }
        Ok(())
    }
}
