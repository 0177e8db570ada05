use chrono::Duration;

use super::common::*;
use crate::error::CoreError;
use crate::leads::domain::Resource;

#[test]
fn trial_state_follows_the_subscription_window() {
    let harness = harness();
    let gate = harness.service.entitlements();

    // Seeded harness trial ends fourteen days out.
    assert!(gate.is_trial_active(&agency()).expect("gate answers"));

    harness
        .store
        .put_subscription(trial_subscription(agency(), Some(epoch() - Duration::days(1))));
    assert!(!gate.is_trial_active(&agency()).expect("gate answers"));

    harness
        .store
        .put_subscription(trial_subscription(agency(), None));
    assert!(
        !gate.is_trial_active(&agency()).expect("gate answers"),
        "open-ended window reads as inactive"
    );
}

#[test]
fn agencies_without_subscriptions_are_inactive() {
    let harness = harness();
    let gate = harness.service.entitlements();
    let ghost = crate::leads::domain::AgencyId("agency-ghost".to_string());
    assert!(!gate.is_trial_active(&ghost).expect("gate answers"));
}

#[test]
fn expired_trials_block_lead_intake() {
    let harness = harness();
    harness
        .store
        .put_subscription(trial_subscription(agency(), Some(epoch() - Duration::hours(1))));

    let denied = harness
        .service
        .create_lead(&manager_ctx(), new_lead("Too Late"));
    assert!(matches!(denied, Err(CoreError::Forbidden(_))));
}

#[test]
fn user_limit_blocks_the_sixth_user_but_not_unlimited_plans() {
    let harness = harness();
    let gate = harness.service.entitlements();
    let ctx = manager_ctx();

    let mut capped = trial_subscription(agency(), Some(epoch() + Duration::days(14)));
    capped.users_limit = 5;
    harness.store.put_subscription(capped);
    harness.store.set_usage(&agency(), Resource::Users, 5);

    let denied = gate.ensure_can_create(&ctx, Resource::Users);
    assert!(matches!(denied, Err(CoreError::Forbidden(_))));

    harness.store.set_usage(&agency(), Resource::Users, 4);
    gate.ensure_can_create(&ctx, Resource::Users)
        .expect("under the limit");

    harness
        .store
        .put_subscription(trial_subscription(agency(), Some(epoch() + Duration::days(14))));
    harness.store.set_usage(&agency(), Resource::Users, 500);
    gate.ensure_can_create(&ctx, Resource::Users)
        .expect("unlimited plan never caps");
}

#[test]
fn prospect_limit_applies_to_lead_intake() {
    let harness = harness();
    let ctx = manager_ctx();

    let mut capped = trial_subscription(agency(), Some(epoch() + Duration::days(14)));
    capped.prospects_limit = 2;
    harness.store.put_subscription(capped);

    create_lead(&harness, "One");
    create_lead(&harness, "Two");
    let denied = harness.service.create_lead(&ctx, new_lead("Three"));
    assert!(matches!(denied, Err(CoreError::Forbidden(_))));
}
