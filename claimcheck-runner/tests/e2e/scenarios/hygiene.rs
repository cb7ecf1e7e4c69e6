//! Queue purges before each phase.

use std::collections::HashSet;
use std::time::Duration;

use claimcheck_core::error::CleanupError;
use claimcheck_runner::drivers::{RedriveStage, run_poison};
use claimcheck_runner::hygiene::purge_queues;
use claimcheck_runner::{Phase, PhaseStatus, RunOptions, Verdict};

use crate::helpers::assertions::{assert_phase, assert_verdict};
use crate::helpers::fake_cloud::{FakeBehavior, FakeCloud};
use crate::helpers::fixtures::{
    FakeProvisioner, run_harness, services, test_config, test_fixture,
};

#[tokio::test(start_paused = true)]
async fn purging_empty_queues_succeeds_and_settles() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture);
    let started = tokio::time::Instant::now();

    // When
    let failures = purge_queues(&fake, &fixture, Duration::from_secs(5)).await;

    // Then
    assert!(failures.is_empty());
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(fake.call_count("purge "), 2);
}

#[tokio::test(start_paused = true)]
async fn purge_already_in_progress_drains_instead() {
    // Given: queues purged a moment ago
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture);
    assert!(purge_queues(&fake, &fixture, Duration::ZERO).await.is_empty());

    // When
    let failures = purge_queues(&fake, &fixture, Duration::ZERO).await;

    // Then: the refused purges fall back to receive-and-delete
    assert!(failures.is_empty());
    assert_eq!(fake.call_count("purge "), 4);
    assert_eq!(fake.call_count("receive "), 2);
}

#[tokio::test(start_paused = true)]
async fn message_left_between_two_purges_is_gone_before_poison() {
    // Given: a purge, then a leftover arrives 20s later
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture).shared();
    assert!(purge_queues(&*fake, &fixture, Duration::ZERO).await.is_empty());
    fake.inject(&fixture.queue.url, "leftover");
    tokio::time::sleep(Duration::from_secs(20)).await;

    // When: the second purge lands inside the service's 60s window
    let failures = purge_queues(&*fake, &fixture, Duration::ZERO).await;

    // Then: the leftover was deleted by hand
    assert!(failures.is_empty());
    assert_eq!(fake.queue_depth(&fixture.queue.url), 0);
    assert_eq!(fake.call_count(&format!("delete {}", fixture.queue.url)), 1);

    let result = run_poison(&services(&fake), &fixture, &test_config()).await;
    assert_eq!(result.stage, RedriveStage::MovedToDeadLetter);
    assert!(result.outcome.is_ok(), "{:?}", result.outcome);
}

#[tokio::test(start_paused = true)]
async fn failing_purge_is_reported_and_settle_still_applies() {
    // Given: the dead-letter queue denies purges
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            failing_purges: HashSet::from([fixture.dead_letter_queue.url.clone()]),
            ..FakeBehavior::default()
        },
    );
    let started = tokio::time::Instant::now();

    // When
    let failures = purge_queues(&fake, &fixture, Duration::from_secs(5)).await;

    // Then: main queue purged, one failure for the dead-letter queue
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        CleanupError::Purge { queue, .. } if queue == "claimcheck-work-dlq"
    ));
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn purge_failures_do_not_change_the_verdict() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            failing_purges: HashSet::from([fixture.dead_letter_queue.url.clone()]),
            ..FakeBehavior::default()
        },
    )
    .shared();

    // When
    let report = run_harness(test_config(), FakeProvisioner::ok(fixture), &fake, RunOptions::default()).await;

    // Then: one failure per phase, both phases still verified
    assert_phase(&report, Phase::Hygiene, PhaseStatus::Failed);
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Passed);
    assert_phase(&report, Phase::Poison, PhaseStatus::Passed);
    assert_eq!(report.cleanup_failures.len(), 2);
    assert!(report.cleanup_failures[0].contains("claimcheck-work-dlq"));
    assert_verdict(&report, Verdict::Passed);
}

#[tokio::test(start_paused = true)]
async fn disabled_hygiene_never_purges() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture).shared();
    let mut config = test_config();
    config.hygiene.enabled = false;

    // When
    let report = run_harness(config, FakeProvisioner::ok(fixture), &fake, RunOptions::default()).await;

    // Then
    assert_eq!(fake.call_count("purge "), 0);
    assert!(report.status_of(Phase::Hygiene).is_none());
    assert_verdict(&report, Verdict::Passed);
}
