use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cache::CacheStats;
use crate::context::UserPermissionContext;
use crate::context_cache::ContextCache;
use crate::decision_cache::PermissionDecisionCache;
use crate::error::Result;
use crate::permission::Permission;
use crate::resolver::UserContextResolver;
use crate::store::PermissionStore;
use crate::types::{RoleId, UserId};

const DEFAULT_CONTEXT_CAPACITY: usize = 1_000;
const DEFAULT_DECISION_CAPACITY: usize = 10_000;
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Authorization engine: resolver plus context and decision caches.
///
/// Caches are owned by the instance, so separate engines (including separate
/// processes) never share state and may disagree within one TTL window.
/// Store failures surface as [`Error::StoreUnavailable`](crate::Error::StoreUnavailable),
/// never as a `false` answer.
#[derive(Debug)]
pub struct PermissionEngine<S> {
    resolver: UserContextResolver<S>,
    contexts: ContextCache,
    decisions: PermissionDecisionCache,
}

/// Builder for [`PermissionEngine`].
#[derive(Debug)]
pub struct EngineBuilder<S> {
    store: S,
    context_capacity: usize,
    context_ttl: Duration,
    decision_capacity: usize,
    decision_ttl: Duration,
    store_timeout: Option<Duration>,
}

impl<S> EngineBuilder<S> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            context_capacity: DEFAULT_CONTEXT_CAPACITY,
            context_ttl: DEFAULT_TTL,
            decision_capacity: DEFAULT_DECISION_CAPACITY,
            decision_ttl: DEFAULT_TTL,
            store_timeout: None,
        }
    }

    /// Sizes the per-user context cache. A capacity of zero disables it.
    /// TTLs longer than a century, `Duration::MAX` included, are clamped.
    pub fn context_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.context_capacity = capacity;
        self.context_ttl = ttl;
        self
    }

    /// Sizes the decision cache. A capacity of zero disables it.
    ///
    /// Decisions never outlive the context they were computed from, so a
    /// `ttl` longer than the context TTL has no effect.
    pub fn decision_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.decision_capacity = capacity;
        self.decision_ttl = ttl;
        self
    }

    /// Bounds every store lookup; a lookup that runs over fails with
    /// `StoreUnavailable`. Requires a tokio runtime.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> PermissionEngine<S> {
        PermissionEngine {
            resolver: UserContextResolver::new(self.store).with_timeout(self.store_timeout),
            contexts: ContextCache::new(self.context_capacity, self.context_ttl),
            decisions: PermissionDecisionCache::new(self.decision_capacity, self.decision_ttl),
        }
    }
}

impl<S> PermissionEngine<S>
where
    S: PermissionStore,
{
    /// Returns whether `user` holds `permission`.
    pub async fn has_permission(&self, user: &UserId, permission: &Permission) -> Result<bool> {
        let epoch = self.decisions.epoch();
        if let Some(allowed) = self.decisions.get(user, permission) {
            debug!(%user, %permission, allowed, "decision cache hit");
            return Ok(allowed);
        }

        let (context, expires_at) = self.cached_context(user).await?;
        let allowed = context.has_permission(permission);
        self.decisions
            .set_if_current(user, permission, allowed, expires_at, epoch);
        Ok(allowed)
    }

    /// Returns true iff every listed permission is held. Empty input is true.
    pub async fn has_all_permissions(
        &self,
        user: &UserId,
        permissions: &[Permission],
    ) -> Result<bool> {
        for permission in permissions {
            if !self.has_permission(user, permission).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true iff at least one listed permission is held. Empty input is false.
    pub async fn has_any_permission(
        &self,
        user: &UserId,
        permissions: &[Permission],
    ) -> Result<bool> {
        for permission in permissions {
            if self.has_permission(user, permission).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns whether one of the user's active roles has this name.
    pub async fn has_role(&self, user: &UserId, role_name: &str) -> Result<bool> {
        let context = self.get_user_context(user).await?;
        Ok(context.has_role(role_name))
    }

    /// Returns whether any of `role_names` is held. Empty input is false.
    pub async fn has_any_role<R>(&self, user: &UserId, role_names: &[R]) -> Result<bool>
    where
        R: AsRef<str> + Sync,
    {
        if role_names.is_empty() {
            return Ok(false);
        }
        let context = self.get_user_context(user).await?;
        Ok(role_names.iter().any(|name| context.has_role(name.as_ref())))
    }

    /// Returns whether the user's highest active priority is at least `min_priority`.
    ///
    /// The highest priority floors at 0, so any `min_priority <= 0` passes even
    /// for users with no roles or only negative-priority roles.
    pub async fn has_minimum_priority(&self, user: &UserId, min_priority: i32) -> Result<bool> {
        let context = self.get_user_context(user).await?;
        Ok(context.highest_priority >= min_priority)
    }

    /// Returns a copy of the user's effective permission set.
    pub async fn get_user_permissions(&self, user: &UserId) -> Result<HashSet<Permission>> {
        let context = self.get_user_context(user).await?;
        Ok(context.permissions.clone())
    }

    /// Returns the user's resolved snapshot, from cache when fresh.
    pub async fn get_user_context(&self, user: &UserId) -> Result<Arc<UserPermissionContext>> {
        self.cached_context(user).await.map(|(context, _)| context)
    }

    async fn cached_context(
        &self,
        user: &UserId,
    ) -> Result<(Arc<UserPermissionContext>, Option<Instant>)> {
        let epoch = self.contexts.epoch();
        if let Some((context, expires_at)) = self.contexts.get_with_expiry(user) {
            debug!(%user, "context cache hit");
            return Ok((context, Some(expires_at)));
        }

        debug!(%user, "context cache miss");
        let context = Arc::new(self.resolver.resolve(user).await?);
        let expires_at = self
            .contexts
            .set_if_current(user.clone(), Arc::clone(&context), epoch);
        Ok((context, expires_at))
    }
}

impl<S> PermissionEngine<S> {
    /// Drops everything cached for `user`.
    ///
    /// Must follow any change to the user's assignments or to a role the user
    /// holds. Reads that start after this returns go back to the store.
    pub fn invalidate_user_cache(&self, user: &UserId) {
        let had_context = self.contexts.invalidate(user);
        let decisions = self.decisions.invalidate(user);
        debug!(%user, had_context, decisions, "invalidated user cache");
    }

    /// Invalidates several users, e.g. every holder of an edited role.
    pub fn invalidate_users<'a>(&self, users: impl IntoIterator<Item = &'a UserId>) {
        for user in users {
            self.invalidate_user_cache(user);
        }
    }

    /// Invalidates every cached snapshot that includes `role` and clears all
    /// cached decisions.
    ///
    /// Users whose snapshot already left the cache are covered by clearing
    /// decisions wholesale. Returns the users whose snapshot was dropped.
    pub fn invalidate_role(&self, role: &RoleId) -> Vec<UserId> {
        let users = self.contexts.invalidate_role(role);
        self.decisions.invalidate_all();
        info!(%role, users = users.len(), "invalidated role holders");
        users
    }

    /// Clears both caches.
    pub fn clear_all_caches(&self) {
        self.contexts.invalidate_all();
        self.decisions.invalidate_all();
        info!("cleared all permission caches");
    }

    /// Drops expired entries from both caches. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.contexts.purge_expired() + self.decisions.purge_expired()
    }

    /// Current cache sizes and capacities. Has no side effects.
    pub fn get_cache_stats(&self) -> CacheStats {
        CacheStats {
            context_cache: self.contexts.usage(),
            decision_cache: self.decisions.usage(),
        }
    }

    pub fn context_cache(&self) -> &ContextCache {
        &self.contexts
    }

    pub fn decision_cache(&self) -> &PermissionDecisionCache {
        &self.decisions
    }

    pub fn store(&self) -> &S {
        self.resolver.store()
    }
}
