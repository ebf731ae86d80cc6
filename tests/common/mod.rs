#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use role_gate::{Permission, PermissionStore, Role, RoleId, StoreError, UserId};

/// Store double with call counting, failure injection and an optional delay
/// applied after the assignment snapshot is taken.
#[derive(Debug, Default)]
pub struct FakeStore {
    assignments: Mutex<HashMap<UserId, Vec<RoleId>>>,
    roles: Mutex<HashMap<RoleId, Role>>,
    fail: AtomicBool,
    lookups: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeStore {
    pub fn add_role(&self, role: Role) {
        self.roles.lock().unwrap().insert(role.id.clone(), role);
    }

    pub fn assign(&self, user: &UserId, role: &RoleId) {
        self.assignments
            .lock()
            .unwrap()
            .entry(user.clone())
            .or_default()
            .push(role.clone());
    }

    pub fn set_active(&self, role: &RoleId, active: bool) {
        if let Some(role) = self.roles.lock().unwrap().get_mut(role) {
            role.is_active = active;
        }
    }

    pub fn set_priority(&self, role: &RoleId, priority: i32) {
        if let Some(role) = self.roles.lock().unwrap().get_mut(role) {
            role.priority = priority;
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionStore for FakeStore {
    async fn find_active_role_assignments(
        &self,
        user: &UserId,
    ) -> Result<Vec<RoleId>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err("database connection refused".into());
        }
        let assigned = self
            .assignments
            .lock()
            .unwrap()
            .get(user)
            .cloned()
            .unwrap_or_default();
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(assigned)
    }

    async fn find_active_roles_by_ids(&self, roles: &[RoleId]) -> Result<Vec<Role>, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("database connection refused".into());
        }
        let guard = self.roles.lock().unwrap();
        Ok(roles
            .iter()
            .filter_map(|id| guard.get(id))
            .filter(|role| role.is_active)
            .cloned()
            .collect())
    }
}

pub fn user(value: &str) -> UserId {
    UserId::try_from(value).unwrap()
}

pub fn role_id(value: &str) -> RoleId {
    RoleId::try_from(value).unwrap()
}

pub fn perm(value: &str) -> Permission {
    Permission::try_from(value).unwrap()
}

pub fn perms(values: &[&str]) -> Vec<Permission> {
    values.iter().map(|value| perm(value)).collect()
}

pub fn role(id: &str, name: &str, priority: i32, permissions: &[&str]) -> Role {
    Role::new(role_id(id), name, priority).with_permissions(perms(permissions))
}

/// Scenario fixture: user `u` holds role A (80) and role B (50).
pub fn scenario_store() -> FakeStore {
    let store = FakeStore::default();
    store.add_role(role("role_a", "Head Chef", 80, &["menus.view", "menus.edit"]));
    store.add_role(role("role_b", "Quality Lead", 50, &["menus.view", "quality.check"]));
    store.assign(&user("u"), &role_id("role_a"));
    store.assign(&user("u"), &role_id("role_b"));
    store
}
