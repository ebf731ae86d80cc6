use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::permission::Permission;
use crate::store::PermissionStore;
use crate::types::{Role, RoleId, UserId};

/// In-memory store implementation for tests and demos.
///
/// Mutations do not touch any engine cache; callers still owe an
/// `invalidate_user_cache` for every affected user.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    assignments: RwLock<HashMap<UserId, HashSet<RoleId>>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    unavailable: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a role definition.
    pub fn upsert_role(&self, role: Role) {
        write(&self.inner.roles).insert(role.id.clone(), role);
    }

    /// Sets a role's active flag. Returns false if the role is unknown.
    pub fn set_role_active(&self, role: &RoleId, active: bool) -> bool {
        self.update_role(role, |role| role.is_active = active)
    }

    /// Sets a role's priority. Returns false if the role is unknown.
    pub fn set_role_priority(&self, role: &RoleId, priority: i32) -> bool {
        self.update_role(role, |role| role.priority = priority)
    }

    /// Replaces a role's permissions. Returns false if the role is unknown.
    pub fn set_role_permissions(
        &self,
        role: &RoleId,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> bool {
        let permissions: HashSet<Permission> = permissions.into_iter().collect();
        self.update_role(role, move |role| role.permissions = permissions)
    }

    /// Assigns a role to a user.
    pub fn assign_role(&self, user: UserId, role: RoleId) {
        write(&self.inner.assignments)
            .entry(user)
            .or_default()
            .insert(role);
    }

    /// Removes a role from a user. Returns whether it was assigned.
    pub fn revoke_role(&self, user: &UserId, role: &RoleId) -> bool {
        let mut guard = write(&self.inner.assignments);
        let Some(roles) = guard.get_mut(user) else {
            return false;
        };
        let removed = roles.remove(role);
        if roles.is_empty() {
            guard.remove(user);
        }
        removed
    }

    /// Users currently assigned `role`, for role-level invalidation.
    pub fn users_with_role(&self, role: &RoleId) -> Vec<UserId> {
        let mut users: Vec<UserId> = read(&self.inner.assignments)
            .iter()
            .filter(|(_, roles)| roles.contains(role))
            .map(|(user, _)| user.clone())
            .collect();
        users.sort();
        users
    }

    /// Makes every lookup fail, to exercise fail-closed paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn update_role(&self, role: &RoleId, apply: impl FnOnce(&mut Role)) -> bool {
        match write(&self.inner.roles).get_mut(role) {
            Some(existing) => {
                apply(existing);
                true
            }
            None => false,
        }
    }

    fn check_available(&self) -> std::result::Result<(), StoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err("memory store marked unavailable".into());
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_active_role_assignments(
        &self,
        user: &UserId,
    ) -> std::result::Result<Vec<RoleId>, StoreError> {
        self.check_available()?;
        let guard = read(&self.inner.assignments);
        Ok(guard
            .get(user)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_active_roles_by_ids(
        &self,
        roles: &[RoleId],
    ) -> std::result::Result<Vec<Role>, StoreError> {
        self.check_available()?;
        let guard = read(&self.inner.roles);
        Ok(roles
            .iter()
            .filter_map(|id| guard.get(id))
            .filter(|role| role.is_active)
            .cloned()
            .collect())
    }
}
