use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cache::{CacheUsage, Fetch, LruTtl, lock};
use crate::permission::Permission;
use crate::types::UserId;

/// Bounded, TTL-bound cache of `(user, permission) -> bool` answers.
///
/// Entries are only ever written from a resolved snapshot, and never outlive
/// the snapshot they were derived from. A per-user index keeps
/// [`invalidate`](Self::invalidate) exact.
#[derive(Debug, Clone)]
pub struct PermissionDecisionCache {
    inner: Arc<Mutex<DecisionState>>,
}

#[derive(Debug)]
struct DecisionState {
    entries: LruTtl<DecisionKey, bool>,
    by_user: HashMap<UserId, HashSet<Permission>>,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct DecisionKey {
    user: UserId,
    permission: Permission,
}

impl DecisionKey {
    fn new(user: &UserId, permission: &Permission) -> Self {
        Self {
            user: user.clone(),
            permission: permission.clone(),
        }
    }
}

impl DecisionState {
    fn forget(&mut self, key: &DecisionKey) {
        if let Some(permissions) = self.by_user.get_mut(&key.user) {
            permissions.remove(&key.permission);
            if permissions.is_empty() {
                self.by_user.remove(&key.user);
            }
        }
    }

    fn insert(&mut self, key: DecisionKey, allowed: bool, expires_at: Instant, now: Instant) {
        if self.entries.capacity() == 0 {
            return;
        }
        let user = key.user.clone();
        let permission = key.permission.clone();
        for removed in self.entries.insert(key, allowed, expires_at, now) {
            self.forget(&removed);
        }
        self.by_user.entry(user).or_default().insert(permission);
    }

    fn remove_user(&mut self, user: &UserId) -> usize {
        let Some(permissions) = self.by_user.remove(user) else {
            return 0;
        };
        let mut removed = 0;
        for permission in permissions {
            let key = DecisionKey {
                user: user.clone(),
                permission,
            };
            if self.entries.remove(&key) {
                removed += 1;
            }
        }
        removed
    }
}

impl PermissionDecisionCache {
    /// Creates a cache holding at most `capacity` answers for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DecisionState {
                entries: LruTtl::new(capacity, ttl),
                by_user: HashMap::new(),
            })),
        }
    }

    /// Returns the cached answer if it is still fresh.
    pub fn get(&self, user: &UserId, permission: &Permission) -> Option<bool> {
        let key = DecisionKey::new(user, permission);
        let mut guard = lock(&self.inner);
        match guard.entries.get(&key, Instant::now()) {
            Fetch::Hit { value, .. } => Some(value),
            Fetch::Expired => {
                guard.forget(&key);
                None
            }
            Fetch::Miss => None,
        }
    }

    /// Stores an answer with the cache's own TTL.
    ///
    /// This is an unconditional write for hosts seeding or overriding answers.
    /// It skips the invalidation-epoch check and is not capped at a parent
    /// snapshot's expiry, so the caller vouches that `allowed` matches the
    /// user's current context. The engine itself only writes through
    /// `set_if_current`.
    pub fn set(&self, user: &UserId, permission: &Permission, allowed: bool) {
        let mut guard = lock(&self.inner);
        let now = Instant::now();
        let expires_at = guard.entries.expiry_from(now);
        guard.insert(DecisionKey::new(user, permission), allowed, expires_at, now);
    }

    /// Removes every answer cached for `user`. Returns how many were dropped.
    pub fn invalidate(&self, user: &UserId) -> usize {
        let mut guard = lock(&self.inner);
        guard.entries.bump_epoch();
        guard.remove_user(user)
    }

    /// Clears the cache.
    pub fn invalidate_all(&self) {
        let mut guard = lock(&self.inner);
        guard.entries.bump_epoch();
        guard.entries.clear();
        guard.by_user.clear();
    }

    /// Drops expired answers. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut guard = lock(&self.inner);
        let stale = guard.entries.purge_expired(Instant::now());
        for key in &stale {
            guard.forget(key);
        }
        stale.len()
    }

    pub fn usage(&self) -> CacheUsage {
        let guard = lock(&self.inner);
        CacheUsage {
            size: guard.entries.len(),
            capacity: guard.entries.capacity(),
        }
    }

    pub fn ttl(&self) -> Duration {
        lock(&self.inner).entries.ttl()
    }

    pub(crate) fn epoch(&self) -> u64 {
        lock(&self.inner).entries.epoch()
    }

    /// Stores an answer unless an invalidation happened since `epoch` was
    /// read. The entry expires with its parent snapshot when that comes first.
    pub(crate) fn set_if_current(
        &self,
        user: &UserId,
        permission: &Permission,
        allowed: bool,
        parent_expiry: Option<Instant>,
        epoch: u64,
    ) -> bool {
        let mut guard = lock(&self.inner);
        if guard.entries.epoch() != epoch || guard.entries.capacity() == 0 {
            return false;
        }
        let now = Instant::now();
        let own_expiry = guard.entries.expiry_from(now);
        let expires_at = parent_expiry.map_or(own_expiry, |parent| parent.min(own_expiry));
        guard.insert(DecisionKey::new(user, permission), allowed, expires_at, now);
        true
    }

    #[cfg(test)]
    fn indexed_users(&self) -> usize {
        lock(&self.inner).by_user.len()
    }
}
