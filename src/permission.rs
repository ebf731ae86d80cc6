use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// A `module.action` permission, e.g. `menus.view`.
///
/// Permissions are atomic: checks compare whole values, with no wildcard or
/// prefix matching. Every constructor, deserialization included, trims and
/// lowercases the input, so a rule table and a store row spelling the same
/// permission differently still compare equal.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Permission(String);

impl Permission {
    /// Normalizes and validates a permission.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let normalized = value.as_ref().trim().to_ascii_lowercase();
        let Some((module, action)) = normalized.split_once('.') else {
            return Err(Error::InvalidPermission(format!(
                "{normalized:?} is not in module.action form"
            )));
        };
        check_segment(&normalized, "module", module)?;
        check_segment(&normalized, "action", action)?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `menus` in `menus.view`.
    pub fn module(&self) -> &str {
        self.segments().0
    }

    /// `view` in `menus.view`.
    pub fn action(&self) -> &str {
        self.segments().1
    }

    fn segments(&self) -> (&str, &str) {
        self.0.split_once('.').unwrap_or((self.0.as_str(), ""))
    }
}

fn check_segment(permission: &str, label: &str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidPermission(format!(
            "{permission:?} has an empty {label}"
        )));
    }
    let valid = segment
        .chars()
        .all(|ch| matches!(ch, 'a'..='z' | '0'..='9' | '_' | '-'));
    if !valid {
        return Err(Error::InvalidPermission(format!(
            "{permission:?} has invalid characters in its {label}"
        )));
    }
    Ok(())
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Permission {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for Permission {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.0
    }
}
