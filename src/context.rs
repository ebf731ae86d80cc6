use std::collections::HashSet;

use crate::permission::Permission;
use crate::types::{Role, RoleId, UserId};

/// Resolved permission snapshot for one user.
///
/// Built from the user's active roles only. `roles` is ordered by priority,
/// highest first, with ties broken by name and then id.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPermissionContext {
    /// User the snapshot belongs to.
    pub user: UserId,
    /// Active roles, highest priority first.
    pub roles: Vec<Role>,
    /// Union of every active role's permissions.
    pub permissions: HashSet<Permission>,
    /// Highest active role priority, floored at 0. Users with no active roles,
    /// or only negative-priority ones, report 0.
    pub highest_priority: i32,
}

impl UserPermissionContext {
    /// A valid snapshot for a user without active roles.
    pub fn empty(user: UserId) -> Self {
        Self {
            user,
            roles: Vec::new(),
            permissions: HashSet::new(),
            highest_priority: 0,
        }
    }

    /// Merges roles into a snapshot.
    ///
    /// Inactive roles are skipped and a role id seen twice is counted once.
    /// The highest priority never drops below 0, so a minimum-priority check
    /// of 0 always passes.
    pub fn from_roles(user: UserId, roles: impl IntoIterator<Item = Role>) -> Self {
        let mut seen: HashSet<RoleId> = HashSet::new();
        let mut roles: Vec<Role> = roles
            .into_iter()
            .filter(|role| role.is_active && seen.insert(role.id.clone()))
            .collect();
        roles.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let permissions = roles
            .iter()
            .flat_map(|role| role.permissions.iter().cloned())
            .collect();
        let highest_priority = roles.iter().map(|role| role.priority).fold(0, i32::max);

        Self {
            user,
            roles,
            permissions,
            highest_priority,
        }
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }

    /// Returns true if the snapshot includes the role with this id.
    pub fn holds_role(&self, role: &RoleId) -> bool {
        self.roles.iter().any(|held| &held.id == role)
    }

    /// Role names in priority order.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(|role| role.name.as_str())
    }
}
