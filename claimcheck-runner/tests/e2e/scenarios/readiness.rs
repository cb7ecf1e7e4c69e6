//! Subscription readiness before any message is sent.

use std::time::Duration;

use claimcheck_core::error::ErrorKind;
use claimcheck_core::poll::PollPolicy;
use claimcheck_runner::probe::{require_active_subscription, wait_for_active_subscription};
use claimcheck_runner::{Phase, PhaseStatus, RunOptions, Verdict};

use crate::helpers::assertions::{assert_detail_contains, assert_phase, assert_verdict};
use crate::helpers::fake_cloud::{FakeBehavior, FakeCloud};
use crate::helpers::fixtures::{FakeProvisioner, run_harness, test_config, test_fixture};

fn policy() -> PollPolicy {
    PollPolicy::from_secs(5, 180)
}

#[tokio::test(start_paused = true)]
async fn pending_subscription_is_confirmed_on_fourth_probe() {
    // Given: the queue subscription stays pending for 3 list calls
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            confirm_after_lists: 3,
            ..FakeBehavior::default()
        },
    );

    // When
    let readiness =
        require_active_subscription(&fake, &fixture.topic_arn, fixture.queue_arn(), policy())
            .await
            .expect("subscription should confirm");

    // Then
    assert!(readiness.confirmed);
    assert_eq!(readiness.attempts, 4);
    assert_eq!(readiness.waited, Duration::from_secs(15));
    assert_eq!(fake.call_count("list_subscriptions "), 4);
}

#[tokio::test(start_paused = true)]
async fn missing_subscription_returns_false_within_budget() {
    // Given: only an unrelated https subscription exists
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            subscribed: false,
            ..FakeBehavior::default()
        },
    );
    let started = tokio::time::Instant::now();

    // When
    let active =
        wait_for_active_subscription(&fake, &fixture.topic_arn, fixture.queue_arn(), policy())
            .await
            .expect("listing works");

    // Then: gave up at the budget, not later
    assert!(!active);
    assert!(started.elapsed() <= Duration::from_secs(180));
    assert!(started.elapsed() >= Duration::from_secs(175));
}

#[tokio::test(start_paused = true)]
async fn list_failure_is_an_environment_error() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            fail_list_subscriptions: true,
            ..FakeBehavior::default()
        },
    );

    // When
    let err = wait_for_active_subscription(&fake, &fixture.topic_arn, fixture.queue_arn(), policy())
        .await
        .expect_err("listing fails");

    // Then: no retries after an API error
    assert_eq!(err.kind(), ErrorKind::Environment);
    assert_eq!(fake.call_count("list_subscriptions "), 1);
}

#[tokio::test(start_paused = true)]
async fn inactive_subscription_skips_phases_and_still_tears_down() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            subscribed: false,
            ..FakeBehavior::default()
        },
    )
    .shared();
    let provisioner = FakeProvisioner::ok(fixture);
    let mut config = test_config();
    config.readiness.timeout_secs = 30;

    // When
    let report = run_harness(config, provisioner.clone(), &fake, RunOptions::default()).await;

    // Then
    assert_phase(&report, Phase::Readiness, PhaseStatus::Error);
    assert_detail_contains(&report, Phase::Readiness, "claimcheck-work");
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Skipped);
    assert_phase(&report, Phase::Poison, PhaseStatus::Skipped);
    assert_verdict(&report, Verdict::Error);
    assert_eq!(provisioner.teardown_count(), 1);
    assert_eq!(fake.call_count("publish "), 0);
    assert_eq!(fake.call_count("purge "), 0);
}
