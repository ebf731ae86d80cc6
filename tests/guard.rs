mod common;

use std::sync::Arc;

use common::{FakeStore, perm, perms, role, role_id, scenario_store, user};
use role_gate::{
    DenyReason, EngineBuilder, Error, GuardDecision, RouteGuard, RouteGuardConfig, RouteRule,
    UnmatchedPolicy,
};

fn guard(store: FakeStore, config: RouteGuardConfig) -> RouteGuard<FakeStore> {
    let engine = Arc::new(EngineBuilder::new(store).build());
    RouteGuard::new(engine, config).unwrap()
}

fn kitchen_rules() -> Vec<RouteRule> {
    vec![
        RouteRule::new("/admin/reports").roles(["Head Chef"]),
        RouteRule::new("/admin")
            .roles(["Administrator"])
            .minimum_priority(90),
        RouteRule::new("/menus/edit")
            .permissions(perms(&["menus.view", "menus.edit"]))
            .minimum_priority(50),
        RouteRule::new("/quality")
            .permissions(perms(&["quality.check", "quality.audit"]))
            .require_all(false),
        RouteRule::new("/finance").permissions(perms(&["finance.view"])),
    ]
}

const DENIED: GuardDecision = GuardDecision::Deny(DenyReason::Forbidden);

#[tokio::test]
async fn rule_without_checks_is_rejected_at_load() {
    let engine = Arc::new(EngineBuilder::new(FakeStore::default()).build());
    let config = RouteGuardConfig::new(vec![
        RouteRule::new("/menus").permissions(perms(&["menus.view"])),
        RouteRule::new("/waste"),
    ]);

    let err = RouteGuard::new(engine, config).expect_err("must reject");

    assert!(matches!(err, Error::InvalidRuleConfiguration(_)));
    assert!(err.to_string().contains("/waste"));
}

#[tokio::test]
async fn first_matching_rule_wins() {
    let guard = guard(scenario_store(), RouteGuardConfig::new(kitchen_rules()));
    let u = user("u");

    assert_eq!(
        guard.check("/admin/reports/daily", Some(&u)).await,
        GuardDecision::Allow
    );
    assert_eq!(guard.check("/admin/users", Some(&u)).await, DENIED);
    assert_eq!(
        guard.matching_rule("/admin/reports").map(|rule| rule.path_prefix.as_str()),
        Some("/admin/reports")
    );
}

#[tokio::test]
async fn unmatched_path_follows_policy() {
    let allow = guard(scenario_store(), RouteGuardConfig::new(kitchen_rules()));
    assert_eq!(allow.check("/dashboard", None).await, GuardDecision::Allow);

    let deny = guard(
        scenario_store(),
        RouteGuardConfig::new(kitchen_rules()).unmatched(UnmatchedPolicy::Deny),
    );
    assert_eq!(deny.check("/dashboard", Some(&user("u"))).await, DENIED);
}

#[tokio::test]
async fn matched_rule_without_user_is_unauthenticated() {
    let guard = guard(scenario_store(), RouteGuardConfig::new(kitchen_rules()));

    assert_eq!(
        guard.check("/menus/edit/7", None).await,
        GuardDecision::Deny(DenyReason::Unauthenticated)
    );
}

#[tokio::test]
async fn checks_combine_with_and() {
    let store = scenario_store();
    store.add_role(role("role_low", "Menu Editor", 10, &["menus.view", "menus.edit"]));
    store.assign(&user("low"), &role_id("role_low"));
    let guard = guard(store, RouteGuardConfig::new(kitchen_rules()));

    assert_eq!(
        guard.check("/menus/edit/7", Some(&user("u"))).await,
        GuardDecision::Allow
    );
    // Has both permissions but fails the priority floor.
    assert_eq!(guard.check("/menus/edit/7", Some(&user("low"))).await, DENIED);
}

#[tokio::test]
async fn require_all_false_accepts_any_permission() {
    let guard = guard(scenario_store(), RouteGuardConfig::new(kitchen_rules()));

    assert_eq!(
        guard.check("/quality/log", Some(&user("u"))).await,
        GuardDecision::Allow
    );
    assert_eq!(guard.check("/finance", Some(&user("u"))).await, DENIED);
}

#[tokio::test]
async fn engine_error_denies_as_unavailable() {
    let store = scenario_store();
    store.set_fail(true);
    let guard = guard(store, RouteGuardConfig::new(kitchen_rules()));

    assert_eq!(
        guard.check("/quality/log", Some(&user("u"))).await,
        GuardDecision::Deny(DenyReason::Unavailable)
    );
    assert!(!guard.check("/admin", Some(&user("u"))).await.is_allowed());
}

#[tokio::test]
async fn guard_sees_invalidated_changes() {
    let guard = guard(scenario_store(), RouteGuardConfig::new(kitchen_rules()));
    let u = user("u");
    assert_eq!(guard.check("/quality", Some(&u)).await, GuardDecision::Allow);

    guard.engine().store().set_active(&role_id("role_b"), false);
    guard.engine().invalidate_user_cache(&u);

    assert_eq!(guard.check("/quality", Some(&u)).await, DENIED);
    assert!(
        !guard
            .engine()
            .has_permission(&u, &perm("quality.check"))
            .await
            .unwrap()
    );
}

#[cfg(feature = "serde")]
#[tokio::test]
async fn json_rules_normalize_and_reject_bad_permissions() {
    let config: RouteGuardConfig = serde_json::from_str(
        r#"{ "rules": [{ "pathPrefix": "/menus", "permissions": ["Menus.View"] }] }"#,
    )
    .unwrap();
    let guard = guard(scenario_store(), config);
    assert_eq!(
        guard.check("/menus", Some(&user("u"))).await,
        GuardDecision::Allow
    );

    let err = serde_json::from_str::<RouteGuardConfig>(
        r#"{ "rules": [{ "pathPrefix": "/x", "permissions": ["not a permission"] }] }"#,
    )
    .expect_err("must reject");
    assert!(err.to_string().contains("invalid permission"));
}
