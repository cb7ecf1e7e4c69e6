//! Claim-check round trip through the full run.

use claimcheck_core::config::{MIB, PublishMode};
use claimcheck_core::error::{AssertionError, ClaimcheckError, ErrorKind};
use claimcheck_runner::drivers::{PipelineStage, run_pipeline};
use claimcheck_runner::{Phase, PhaseStatus, RunOptions, Verdict};

use crate::helpers::assertions::{assert_detail_contains, assert_phase, assert_verdict, phase_report};
use crate::helpers::fake_cloud::{FakeBehavior, FakeCloud};
use crate::helpers::fixtures::{FakeProvisioner, run_harness, services, test_config, test_fixture};

fn pipeline_only() -> RunOptions {
    RunOptions {
        phases: vec![Phase::Pipeline],
        keep_resources: false,
    }
}

#[tokio::test(start_paused = true)]
async fn cloudevent_round_trip_verifies_15_mib_payload() {
    // Given: a confirmed subscription and a 15 MiB payload
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture).shared();
    let provisioner = FakeProvisioner::ok(fixture.clone());
    let mut config = test_config();
    config.payload.min_bytes = 15 * MIB;
    config.payload.max_bytes = 15 * MIB;
    config.pipeline.publish_mode = PublishMode::CloudEvent;

    // When
    let report = run_harness(config, provisioner.clone(), &fake, pipeline_only()).await;

    // Then: every phase passes and the stack is torn down once
    assert_phase(&report, Phase::Provision, PhaseStatus::Passed);
    assert_phase(&report, Phase::Readiness, PhaseStatus::Passed);
    assert_phase(&report, Phase::Hygiene, PhaseStatus::Passed);
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Passed);
    assert_phase(&report, Phase::Teardown, PhaseStatus::Passed);
    assert_verdict(&report, Verdict::Passed);
    assert_detail_contains(&report, Phase::Pipeline, "15728640 bytes");
    assert_detail_contains(&report, Phase::Pipeline, "generic event");
    assert!(report.cleanup_failures.is_empty());
    assert_eq!(provisioner.teardown_count(), 1);

    // Then: one object stored, one publish, notification acknowledged
    assert_eq!(fake.object_count(), 1);
    assert_eq!(fake.call_count("publish "), 1);
    assert_eq!(fake.call_count("get_object "), 1);
    assert_eq!(fake.queue_depth(&fixture.queue.url), 0);
}

#[tokio::test(start_paused = true)]
async fn storage_notification_round_trip_verifies_18_mib_payload() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::new(&fixture).shared();
    let mut config = test_config();
    config.payload.min_bytes = 18 * MIB;
    config.payload.max_bytes = 18 * MIB;
    config.pipeline.publish_mode = PublishMode::StorageNotification;

    // When
    let report = run_harness(config, FakeProvisioner::ok(fixture.clone()), &fake, pipeline_only()).await;

    // Then
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Passed);
    assert_verdict(&report, Verdict::Passed);
    assert_detail_contains(&report, Phase::Pipeline, "18874368 bytes");
    assert_detail_contains(&report, Phase::Pipeline, "storage event");
    assert_eq!(fake.queue_depth(&fixture.queue.url), 0);
}

#[tokio::test(start_paused = true)]
async fn bucket_notification_mode_relies_on_storage_events() {
    // Given: the store announces every put on the topic
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            bucket_notifications: true,
            ..FakeBehavior::default()
        },
    )
    .shared();
    let mut config = test_config();
    config.pipeline.publish_mode = PublishMode::BucketNotification;

    // When
    let report = run_harness(config, FakeProvisioner::ok(fixture), &fake, pipeline_only()).await;

    // Then: nothing was published by the harness itself
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Passed);
    assert_detail_contains(&report, Phase::Pipeline, "storage event");
    assert_eq!(fake.call_count("publish "), 0);
}

#[tokio::test(start_paused = true)]
async fn corrupted_download_fails_pipeline_but_not_poison() {
    // Given: every download comes back with its first byte flipped
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            corrupt_downloads: true,
            ..FakeBehavior::default()
        },
    )
    .shared();
    let provisioner = FakeProvisioner::ok(fixture);

    // When
    let report = run_harness(test_config(), provisioner.clone(), &fake, RunOptions::default()).await;

    // Then: assertion failure on pipeline only, the run continues
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Failed);
    assert_eq!(
        phase_report(&report, Phase::Pipeline).error_kind,
        Some(ErrorKind::Assertion)
    );
    assert_detail_contains(&report, Phase::Pipeline, "digest mismatch");
    assert_phase(&report, Phase::Poison, PhaseStatus::Passed);
    assert_verdict(&report, Verdict::Failed);
    assert_eq!(provisioner.teardown_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pipeline_reports_stage_reached() {
    // Given
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            corrupt_downloads: true,
            ..FakeBehavior::default()
        },
    )
    .shared();

    // When
    let result = run_pipeline(&services(&fake), &fixture, &test_config()).await;

    // Then: the object was downloaded but never verified
    assert_eq!(result.stage, PipelineStage::Downloaded);
    assert!(result.outcome.is_err());
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_delivery_times_out_with_nothing_received() {
    // Given: the queue never gets the notification
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            subscribed: false,
            ..FakeBehavior::default()
        },
    )
    .shared();
    let mut config = test_config();
    config.pipeline.receive_budget_secs = 12;

    // When: drive the pipeline directly, bypassing readiness
    let result = run_pipeline(&services(&fake), &fixture, &config).await;

    // Then
    assert_eq!(result.stage, PipelineStage::Published);
    let err = result.outcome.expect_err("nothing should arrive");
    assert!(err.to_string().contains("no message on queue 'claimcheck-work'"), "{err}");
    assert_eq!(err.kind(), ErrorKind::Assertion);
}

fn point_at_other_key(message: &str) -> String {
    let mut event: serde_json::Value = serde_json::from_str(message).expect("cloudevent json");
    event["data"]["key"] = "someone-elses-object".into();
    event.to_string()
}

fn advertise_zero_digest(message: &str) -> String {
    let mut event: serde_json::Value = serde_json::from_str(message).expect("cloudevent json");
    event["data"]["md5sum"] = "0".repeat(32).into();
    event.to_string()
}

fn cloudevent_config() -> claimcheck_core::config::ClaimcheckConfig {
    let mut config = test_config();
    config.pipeline.publish_mode = PublishMode::CloudEvent;
    config
}

#[tokio::test(start_paused = true)]
async fn event_pointing_at_another_object_is_a_locator_mismatch() {
    // Given: the event arrives with a different object key
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            rewrite_published: Some(point_at_other_key),
            ..FakeBehavior::default()
        },
    )
    .shared();

    // When
    let result = run_pipeline(&services(&fake), &fixture, &cloudevent_config()).await;

    // Then: both locators reported, nothing downloaded
    assert_eq!(result.stage, PipelineStage::Unwrapped);
    match result.outcome.expect_err("locator should not match") {
        ClaimcheckError::Assertion(AssertionError::LocatorMismatch { expected, actual }) => {
            assert!(expected.starts_with("s3://claimcheck-payloads/"), "{expected}");
            assert_ne!(expected, actual);
            assert_eq!(actual, "s3://claimcheck-payloads/someone-elses-object");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fake.call_count("get_object "), 0);

    // Then: the notification was acknowledged before the check
    assert_eq!(fake.queue_depth(&fixture.queue.url), 0);
    assert_eq!(fake.call_count(&format!("delete {}", fixture.queue.url)), 1);
}

#[tokio::test(start_paused = true)]
async fn wrong_advertised_digest_fails_before_download() {
    // Given: the event advertises an all-zero md5sum
    let fixture = test_fixture();
    let fake = FakeCloud::with_behavior(
        &fixture,
        FakeBehavior {
            rewrite_published: Some(advertise_zero_digest),
            ..FakeBehavior::default()
        },
    )
    .shared();
    let provisioner = FakeProvisioner::ok(fixture.clone());

    // When
    let report = run_harness(cloudevent_config(), provisioner, &fake, pipeline_only()).await;

    // Then
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Failed);
    assert_eq!(
        phase_report(&report, Phase::Pipeline).error_kind,
        Some(ErrorKind::Assertion)
    );
    assert_detail_contains(&report, Phase::Pipeline, "digest mismatch: expected ");
    assert_detail_contains(&report, Phase::Pipeline, &format!("got {}", "0".repeat(32)));
    assert_verdict(&report, Verdict::Failed);
    assert_eq!(fake.call_count("get_object "), 0);
    assert_eq!(fake.queue_depth(&fixture.queue.url), 0);
}
