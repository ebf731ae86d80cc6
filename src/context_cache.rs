use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cache::{CacheUsage, Fetch, LruTtl, lock};
use crate::context::UserPermissionContext;
use crate::types::{RoleId, UserId};

/// Bounded, TTL-bound cache of per-user permission snapshots.
///
/// A capacity of zero disables caching.
#[derive(Debug, Clone)]
pub struct ContextCache {
    inner: Arc<Mutex<LruTtl<UserId, Arc<UserPermissionContext>>>>,
}

impl ContextCache {
    /// Creates a cache holding at most `capacity` users for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruTtl::new(capacity, ttl))),
        }
    }

    /// Returns the cached snapshot if it is younger than the TTL.
    pub fn get(&self, user: &UserId) -> Option<Arc<UserPermissionContext>> {
        self.get_with_expiry(user).map(|(context, _)| context)
    }

    /// Inserts or replaces a user's snapshot, resetting its age.
    ///
    /// Unconditional: no invalidation-epoch check, so a snapshot built before
    /// the latest [`invalidate`](Self::invalidate) still lands. The engine
    /// populates the cache through an epoch-checked path instead.
    pub fn set(&self, user: UserId, context: Arc<UserPermissionContext>) {
        let mut guard = lock(&self.inner);
        let now = Instant::now();
        let expires_at = guard.expiry_from(now);
        guard.insert(user, context, expires_at, now);
    }

    /// Removes a user's snapshot. Returns whether one was resident.
    pub fn invalidate(&self, user: &UserId) -> bool {
        let mut guard = lock(&self.inner);
        guard.bump_epoch();
        guard.remove(user)
    }

    /// Removes every snapshot that includes `role` and returns the affected users.
    pub fn invalidate_role(&self, role: &RoleId) -> Vec<UserId> {
        let mut guard = lock(&self.inner);
        guard.bump_epoch();
        let users = guard.keys_where(Instant::now(), |context| context.holds_role(role));
        for user in &users {
            guard.remove(user);
        }
        users
    }

    /// Clears the cache.
    pub fn invalidate_all(&self) {
        let mut guard = lock(&self.inner);
        guard.bump_epoch();
        guard.clear();
    }

    /// Drops expired snapshots. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        lock(&self.inner).purge_expired(Instant::now()).len()
    }

    pub fn usage(&self) -> CacheUsage {
        let guard = lock(&self.inner);
        CacheUsage {
            size: guard.len(),
            capacity: guard.capacity(),
        }
    }

    pub fn ttl(&self) -> Duration {
        lock(&self.inner).ttl()
    }

    pub(crate) fn get_with_expiry(
        &self,
        user: &UserId,
    ) -> Option<(Arc<UserPermissionContext>, Instant)> {
        let mut guard = lock(&self.inner);
        match guard.get(user, Instant::now()) {
            Fetch::Hit { value, expires_at } => Some((value, expires_at)),
            Fetch::Expired | Fetch::Miss => None,
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        lock(&self.inner).epoch()
    }

    /// Inserts only if no invalidation happened since `epoch` was read.
    /// Returns the entry's expiry when it was stored.
    pub(crate) fn set_if_current(
        &self,
        user: UserId,
        context: Arc<UserPermissionContext>,
        epoch: u64,
    ) -> Option<Instant> {
        let mut guard = lock(&self.inner);
        if guard.epoch() != epoch || guard.capacity() == 0 {
            return None;
        }
        let now = Instant::now();
        let expires_at = guard.expiry_from(now);
        guard.insert(user, context, expires_at, now);
        Some(expires_at)
    }
}
