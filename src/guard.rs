//! Path-prefix authorization rules evaluated against a [`PermissionEngine`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::PermissionEngine;
use crate::error::{Error, Result};
use crate::permission::Permission;
use crate::store::PermissionStore;
use crate::types::UserId;

/// What to do with a path no rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum UnmatchedPolicy {
    /// Let the request through without a check.
    #[default]
    Allow,
    /// Reject the request as forbidden.
    Deny,
}

/// One entry of the ordered rule table.
///
/// Every present check must pass: role membership (any listed role), minimum
/// priority, then permissions (all or any, per `require_all`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RouteRule {
    /// Matched with a plain string prefix test against the request path.
    pub path_prefix: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub permissions: Vec<Permission>,
    #[cfg_attr(feature = "serde", serde(default = "default_require_all"))]
    pub require_all: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub minimum_priority: Option<i32>,
    /// Role names; the user needs any one of them.
    #[cfg_attr(feature = "serde", serde(default))]
    pub roles: Vec<String>,
}

#[cfg(feature = "serde")]
fn default_require_all() -> bool {
    true
}

impl RouteRule {
    /// Creates a rule without checks; add at least one before use.
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            permissions: Vec::new(),
            require_all: true,
            minimum_priority: None,
            roles: Vec::new(),
        }
    }

    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Whether every listed permission is required (default) or just one.
    pub fn require_all(mut self, on: bool) -> Self {
        self.require_all = on;
        self
    }

    pub fn minimum_priority(mut self, priority: i32) -> Self {
        self.minimum_priority = Some(priority);
        self
    }

    pub fn roles<R: Into<String>>(mut self, roles: impl IntoIterator<Item = R>) -> Self {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.path_prefix)
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.path_prefix.is_empty() {
            return Err(Error::InvalidRuleConfiguration(format!(
                "rule {index} has an empty path prefix"
            )));
        }
        if self.permissions.is_empty() && self.roles.is_empty() && self.minimum_priority.is_none()
        {
            return Err(Error::InvalidRuleConfiguration(format!(
                "rule {index} ({}) has no checks",
                self.path_prefix
            )));
        }
        Ok(())
    }
}

/// Rule table plus the policy for unmatched paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteGuardConfig {
    /// Evaluated in order; the first match wins.
    pub rules: Vec<RouteRule>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub unmatched: UnmatchedPolicy,
}

impl RouteGuardConfig {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self {
            rules,
            unmatched: UnmatchedPolicy::default(),
        }
    }

    pub fn unmatched(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }
}

/// Why a request was rejected. Carries nothing about roles or permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A rule matched but there is no authenticated user.
    Unauthenticated,
    /// The user does not satisfy the rule, or the path is unmatched under
    /// [`UnmatchedPolicy::Deny`].
    Forbidden,
    /// Authorization could not be evaluated; the request fails closed.
    Unavailable,
}

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny(DenyReason),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Stateless per-request evaluator over an ordered rule table.
#[derive(Debug)]
pub struct RouteGuard<S> {
    engine: Arc<PermissionEngine<S>>,
    rules: Vec<RouteRule>,
    unmatched: UnmatchedPolicy,
}

impl<S> RouteGuard<S> {
    /// Validates the rule table. A rule with no checks is rejected here, never
    /// at request time.
    pub fn new(engine: Arc<PermissionEngine<S>>, config: RouteGuardConfig) -> Result<Self> {
        for (index, rule) in config.rules.iter().enumerate() {
            rule.validate(index)?;
        }
        Ok(Self {
            engine,
            rules: config.rules,
            unmatched: config.unmatched,
        })
    }

    /// Returns the first rule matching `path`.
    pub fn matching_rule(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn engine(&self) -> &Arc<PermissionEngine<S>> {
        &self.engine
    }
}

impl<S> RouteGuard<S>
where
    S: PermissionStore,
{
    /// Decides whether `user` may access `path`.
    pub async fn check(&self, path: &str, user: Option<&UserId>) -> GuardDecision {
        let Some(rule) = self.matching_rule(path) else {
            debug!(path, policy = ?self.unmatched, "no rule matched");
            return match self.unmatched {
                UnmatchedPolicy::Allow => GuardDecision::Allow,
                UnmatchedPolicy::Deny => GuardDecision::Deny(DenyReason::Forbidden),
            };
        };
        let Some(user) = user else {
            debug!(path, rule = %rule.path_prefix, "unauthenticated request");
            return GuardDecision::Deny(DenyReason::Unauthenticated);
        };

        match self.evaluate(rule, user).await {
            Ok(true) => {
                debug!(path, %user, rule = %rule.path_prefix, "allowed");
                GuardDecision::Allow
            }
            Ok(false) => {
                debug!(path, %user, rule = %rule.path_prefix, "forbidden");
                GuardDecision::Deny(DenyReason::Forbidden)
            }
            Err(err) => {
                warn!(path, %user, rule = %rule.path_prefix, error = %err, "authorization failed, denying");
                GuardDecision::Deny(DenyReason::Unavailable)
            }
        }
    }

    async fn evaluate(&self, rule: &RouteRule, user: &UserId) -> Result<bool> {
        if !rule.roles.is_empty() && !self.engine.has_any_role(user, &rule.roles).await? {
            return Ok(false);
        }
        if let Some(min_priority) = rule.minimum_priority
            && !self.engine.has_minimum_priority(user, min_priority).await?
        {
            return Ok(false);
        }
        if rule.permissions.is_empty() {
            return Ok(true);
        }
        if rule.require_all {
            self.engine
                .has_all_permissions(user, &rule.permissions)
                .await
        } else {
            self.engine
                .has_any_permission(user, &rule.permissions)
                .await
        }
    }
}
