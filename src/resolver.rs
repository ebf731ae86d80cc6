use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::UserPermissionContext;
use crate::error::{Error, Result, StoreError, StoreTimeout};
use crate::store::PermissionStore;
use crate::types::UserId;

/// Loads a user's active roles from the store and merges them into a snapshot.
#[derive(Debug)]
pub struct UserContextResolver<S> {
    store: S,
    timeout: Option<Duration>,
}

impl<S> UserContextResolver<S> {
    /// Creates a resolver without a lookup timeout.
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bounds each store call. Needs a tokio runtime when set.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> UserContextResolver<S>
where
    S: PermissionStore,
{
    /// Resolves a fresh snapshot for `user`.
    ///
    /// A user without assignments resolves to an empty snapshot. A failing or
    /// slow store yields [`Error::StoreUnavailable`].
    #[tracing::instrument(level = "debug", skip_all, fields(user = %user))]
    pub async fn resolve(&self, user: &UserId) -> Result<UserPermissionContext> {
        let assigned = self
            .bounded(self.store.find_active_role_assignments(user))
            .await?;
        if assigned.is_empty() {
            debug!("no role assignments");
            return Ok(UserPermissionContext::empty(user.clone()));
        }

        let roles = self
            .bounded(self.store.find_active_roles_by_ids(&assigned))
            .await?;
        // Only roles that were actually asked for may contribute.
        let roles = roles.into_iter().filter(|role| assigned.contains(&role.id));
        let context = UserPermissionContext::from_roles(user.clone(), roles);
        debug!(
            roles = context.roles.len(),
            permissions = context.permissions.len(),
            highest_priority = context.highest_priority,
            "resolved context"
        );
        Ok(context)
    }

    async fn bounded<T>(
        &self,
        lookup: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Box::new(StoreTimeout(limit)) as StoreError),
            },
            None => lookup.await,
        };
        outcome.map_err(|err| {
            warn!(error = %err, "permission store lookup failed");
            Error::from(err)
        })
    }
}
