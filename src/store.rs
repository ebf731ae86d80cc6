use crate::error::StoreError;
use crate::types::{Role, RoleId, UserId};
use async_trait::async_trait;

/// Read-only source of role assignments and role definitions.
///
/// The engine never writes through this trait. Whoever mutates the backing
/// data must call [`PermissionEngine::invalidate_user_cache`] for every
/// affected user afterwards.
///
/// [`PermissionEngine::invalidate_user_cache`]: crate::PermissionEngine::invalidate_user_cache
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Returns the ids of roles currently assigned to a user.
    async fn find_active_role_assignments(
        &self,
        user: &UserId,
    ) -> std::result::Result<Vec<RoleId>, StoreError>;

    /// Returns the active roles among `roles`.
    async fn find_active_roles_by_ids(
        &self,
        roles: &[RoleId],
    ) -> std::result::Result<Vec<Role>, StoreError>;
}

#[async_trait]
impl<T> PermissionStore for std::sync::Arc<T>
where
    T: PermissionStore + ?Sized,
{
    async fn find_active_role_assignments(
        &self,
        user: &UserId,
    ) -> std::result::Result<Vec<RoleId>, StoreError> {
        (**self).find_active_role_assignments(user).await
    }

    async fn find_active_roles_by_ids(
        &self,
        roles: &[RoleId],
    ) -> std::result::Result<Vec<Role>, StoreError> {
        (**self).find_active_roles_by_ids(roles).await
    }
}
