use crate::error::{Error, Result};
use crate::permission::Permission;
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

const MAX_ID_LEN: usize = 128;

fn validate_id(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_ID_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_id_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-')
}

macro_rules! define_id_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate_id(value.as_ref(), $kind).map(Self)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id_type!(
    /// User identifier.
    UserId,
    "user id"
);
define_id_type!(
    /// Role identifier.
    RoleId,
    "role id"
);

/// Role definition as returned by a [`PermissionStore`](crate::PermissionStore).
///
/// `metadata` is carried through to the resolved context untouched; nothing in
/// this crate reads it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    /// Role identifier.
    pub id: RoleId,
    /// Unique display name, used by role checks.
    pub name: String,
    /// Rank used by minimum-priority checks.
    pub priority: i32,
    /// Permissions granted by the role.
    pub permissions: HashSet<Permission>,
    /// Inactive roles never contribute to a resolved context.
    pub is_active: bool,
    /// Opaque per-role data.
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: serde_json::Value,
}

impl Role {
    /// Creates an active role without permissions or metadata.
    pub fn new(id: RoleId, name: impl Into<String>, priority: i32) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            permissions: HashSet::new(),
            is_active: true,
            metadata: serde_json::Value::Null,
        }
    }

    /// Adds permissions to the role.
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Attaches opaque metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{RoleId, UserId};

    #[test]
    fn user_id_should_trim_input() {
        let user = UserId::try_from("  user_1 ").expect("user id");
        assert_eq!(user.as_str(), "user_1");
    }

    #[test]
    fn user_id_should_reject_empty_input() {
        let err = UserId::try_from("   ").expect_err("must reject");
        assert!(err.to_string().contains("user id"));
    }

    #[test]
    fn role_id_should_reject_invalid_chars() {
        let err = RoleId::try_from("kitchen manager").expect_err("must reject");
        assert!(err.to_string().contains("role id"));
    }

    #[test]
    fn ids_should_accept_uuid_shape() {
        let user = UserId::try_from("3f0b6c2e-91a4-4d7e-8f3a-2c1d5e6f7a8b").expect("user id");
        assert_eq!(user.to_string(), "3f0b6c2e-91a4-4d7e-8f3a-2c1d5e6f7a8b");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_should_validate_ids() {
        let user: UserId = serde_json::from_str(r#"" user_1 ""#).expect("user id");
        assert_eq!(user.as_str(), "user_1");

        let err = serde_json::from_str::<RoleId>(r#""kitchen manager""#).expect_err("must reject");
        assert!(err.to_string().contains("role id"));
    }
}
