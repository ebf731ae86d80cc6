//! Role-based authorization core.
//!
//! A [`PermissionEngine`] resolves a user's active roles from a pluggable
//! async [`PermissionStore`], merges them into a [`UserPermissionContext`],
//! and answers permission, role, and priority queries from two bounded
//! LRU + TTL caches. A [`RouteGuard`] maps path prefixes to checks on top of
//! the engine. Store failures are errors, never denials: callers fail closed.
//!
//! # Examples
//!
//! Basic authorization flow using the in-memory store (enable `memory-store`):
//! ```
//! use role_gate::{EngineBuilder, Permission, UserId};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use role_gate::{MemoryStore, Role, RoleId};
//! let store = MemoryStore::new();
//! let role = RoleId::try_from("role_chef").unwrap();
//! store.upsert_role(
//!     Role::new(role.clone(), "Head Chef", 80)
//!         .with_permissions([Permission::try_from("menus.edit").unwrap()]),
//! );
//! let user = UserId::try_from("user_1").unwrap();
//! store.assign_role(user.clone(), role);
//!
//! let engine = EngineBuilder::new(store).build();
//! let permission = Permission::try_from("menus.edit").unwrap();
//! let allowed = futures::executor::block_on(engine.has_permission(&user, &permission))?;
//! assert!(allowed);
//! # }
//! # Ok::<(), role_gate::Error>(())
//! ```
//!
//! Guarding paths:
//! ```no_run
//! use role_gate::{Permission, RouteGuardConfig, RouteRule, UnmatchedPolicy};
//! let config = RouteGuardConfig::new(vec![
//!     RouteRule::new("/admin").roles(["Administrator"]).minimum_priority(90),
//!     RouteRule::new("/menus")
//!         .permissions([Permission::try_from("menus.view").unwrap()]),
//! ])
//! .unmatched(UnmatchedPolicy::Deny);
//! # let _ = config;
//! ```
#![forbid(unsafe_code)]

mod cache;
mod context;
mod context_cache;
mod decision_cache;
mod engine;
mod error;
mod guard;
mod permission;
mod resolver;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::cache::{CacheStats, CacheUsage};
pub use crate::context::UserPermissionContext;
pub use crate::context_cache::ContextCache;
pub use crate::decision_cache::PermissionDecisionCache;
pub use crate::engine::{EngineBuilder, PermissionEngine};
pub use crate::error::{Error, Result, StoreError, StoreTimeout};
pub use crate::guard::{
    DenyReason, GuardDecision, RouteGuard, RouteGuardConfig, RouteRule, UnmatchedPolicy,
};
pub use crate::permission::Permission;
pub use crate::resolver::UserContextResolver;
pub use crate::store::PermissionStore;
pub use crate::types::{Role, RoleId, UserId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
