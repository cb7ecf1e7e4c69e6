//! Poison-message redrive to the dead-letter queue.

use claimcheck_core::error::ErrorKind;
use claimcheck_runner::drivers::{RedriveStage, run_poison};
use claimcheck_runner::{Phase, PhaseStatus, RunOptions, Verdict};

use crate::helpers::assertions::{assert_detail_contains, assert_phase, assert_verdict};
use crate::helpers::fake_cloud::{FakeBehavior, FakeCloud};
use crate::helpers::fixtures::{FakeProvisioner, run_harness, services, test_config, test_fixture};

fn poison_only() -> RunOptions {
    RunOptions {
        phases: vec![Phase::Poison],
        keep_resources: false,
    }
}

#[tokio::test(start_paused = true)]
async fn poison_message_lands_on_dead_letter_queue() {
    // Given: max receive count 1, visibility 5s
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture).shared();

    // When
    let report = run_harness(test_config(), FakeProvisioner::ok(fixture.clone()), &fake, poison_only()).await;

    // Then
    assert_phase(&report, Phase::Poison, PhaseStatus::Passed);
    assert_detail_contains(&report, Phase::Poison, "'dlq-test-");
    assert_detail_contains(&report, Phase::Poison, "after 1 deliveries");
    assert_verdict(&report, Verdict::Passed);

    // Then: the dead-letter copy was acknowledged, nothing left behind
    assert_eq!(fake.queue_depth(&fixture.queue.url), 0);
    assert_eq!(fake.queue_depth(&fixture.dead_letter_queue.url), 0);
    assert_eq!(fake.call_count(&format!("delete {}", fixture.dead_letter_queue.url)), 1);
    assert_eq!(fake.call_count(&format!("delete {}", fixture.queue.url)), 0);
}

#[tokio::test(start_paused = true)]
async fn redrive_after_two_deliveries() {
    // Given: queue and harness agree on max receive count 2
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            max_receive_count: 2,
            ..FakeBehavior::default()
        },
    )
    .shared();
    let mut config = test_config();
    config.poison.max_receive_count = 2;

    // When
    let result = run_poison(&services(&fake), &fixture, &config).await;

    // Then
    assert_eq!(result.stage, RedriveStage::MovedToDeadLetter);
    let summary = result.outcome.expect("redrive should be observed");
    assert_eq!(summary.deliveries, 2);
    assert!(summary.body.starts_with("dlq-test-"));
    assert_eq!(summary.dead_letter_receive_count, Some(1));
}

#[tokio::test(start_paused = true)]
async fn stray_message_on_main_queue_fails_count_check() {
    // Given: a leftover message the harness did not publish
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture).shared();
    fake.inject(&fixture.queue.url, "leftover");

    // When: hygiene is skipped, so the stray message is still there
    let result = run_poison(&services(&fake), &fixture, &test_config()).await;

    // Then
    assert_eq!(result.stage, RedriveStage::Published);
    let err = result.outcome.expect_err("two messages should be received");
    assert_eq!(err.kind(), ErrorKind::Assertion);
    assert!(
        err.to_string().contains("delivered 2 message(s), expected 1"),
        "{err}"
    );
}

#[tokio::test(start_paused = true)]
async fn hygiene_removes_stray_messages_before_poison() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture).shared();
    fake.inject(&fixture.queue.url, "leftover");
    fake.inject(&fixture.dead_letter_queue.url, "old-dead-letter");

    // When
    let report = run_harness(test_config(), FakeProvisioner::ok(fixture), &fake, poison_only()).await;

    // Then
    assert_phase(&report, Phase::Hygiene, PhaseStatus::Passed);
    assert_phase(&report, Phase::Poison, PhaseStatus::Passed);
}

#[tokio::test(start_paused = true)]
async fn mismatched_receive_count_leaves_dead_letter_queue_empty() {
    // Given: the queue tolerates 3 receives but the harness expects 1
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            max_receive_count: 3,
            ..FakeBehavior::default()
        },
    )
    .shared();
    let mut config = test_config();
    config.poison.dlq_budget_secs = 6;

    // When
    let result = run_poison(&services(&fake), &fixture, &config).await;

    // Then: the redrive receive returned the message instead of moving it
    assert_eq!(result.stage, RedriveStage::RedriveTriggered);
    let err = result.outcome.expect_err("dead-letter queue should stay empty");
    assert!(err.to_string().contains("claimcheck-work-dlq"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn failed_redrive_receive_is_named_in_dead_letter_error() {
    // Given: the first receive delivers, the redrive receive fails
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            failing_receive_call: Some(2),
            ..FakeBehavior::default()
        },
    )
    .shared();
    let mut config = test_config();
    config.poison.dlq_budget_secs = 6;

    // When
    let result = run_poison(&services(&fake), &fixture, &config).await;

    // Then: the dead-letter error carries the earlier failure
    assert_eq!(result.stage, RedriveStage::RedriveTriggered);
    let err = result.outcome.expect_err("nothing was redriven");
    assert_eq!(err.kind(), ErrorKind::Assertion);
    let msg = err.to_string();
    assert!(msg.contains("no message on queue 'claimcheck-work-dlq'"), "{msg}");
    assert!(msg.contains("injected receive failure"), "{msg}");
}
