//! Broken fixture documents stop the run before any cloud call.

use claimcheck_core::error::ErrorKind;
use claimcheck_runner::{Phase, PhaseStatus, RunOptions, StaticFixtureProvisioner, Verdict};

use crate::helpers::assertions::{assert_detail_contains, assert_phase, assert_verdict, phase_report};
use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::fixtures::{output_document, run_harness, test_config, test_fixture};

fn write_document(dir: &tempfile::TempDir, document: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("outputs.json");
    std::fs::write(&path, document.to_string()).expect("write fixture document");
    path
}

#[tokio::test]
async fn missing_queue_url_is_fatal_before_any_cloud_call() {
    // Given: a document whose main queue has no url
    let fixture = test_fixture();
    let mut document = output_document(&fixture);
    document["claimcheck"]["value"]["claimcheck_sqs"]
        .as_object_mut()
        .expect("claimcheck_sqs object")
        .remove("url");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(&dir, &document);
    let fake = FakeCloud::new(&fixture).shared();

    // When
    let report = run_harness(
        test_config(),
        StaticFixtureProvisioner::new(path, "claimcheck"),
        &fake,
        RunOptions::default(),
    )
    .await;

    // Then: environment error naming the field, exit code 2
    assert_phase(&report, Phase::Provision, PhaseStatus::Error);
    assert_eq!(
        phase_report(&report, Phase::Provision).error_kind,
        Some(ErrorKind::Environment)
    );
    assert_detail_contains(&report, Phase::Provision, "claimcheck_sqs.url");
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Skipped);
    assert_phase(&report, Phase::Poison, PhaseStatus::Skipped);
    assert_verdict(&report, Verdict::Error);
    assert_eq!(report.exit_code(), 2);

    // Then: no service was touched, teardown still ran
    assert!(fake.calls().is_empty(), "unexpected calls: {:?}", fake.calls());
    assert_phase(&report, Phase::Teardown, PhaseStatus::Passed);
}

#[tokio::test]
async fn wrong_output_key_is_reported() {
    // Given
    let fixture = test_fixture();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(&dir, &output_document(&fixture));
    let fake = FakeCloud::new(&fixture).shared();

    // When
    let report = run_harness(
        test_config(),
        StaticFixtureProvisioner::new(path, "other-stack"),
        &fake,
        RunOptions::default(),
    )
    .await;

    // Then
    assert_phase(&report, Phase::Provision, PhaseStatus::Error);
    assert_detail_contains(&report, Phase::Provision, "other-stack");
    assert!(fake.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn valid_document_drives_full_run() {
    // Given
    let fixture = test_fixture();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(&dir, &output_document(&fixture));
    let fake = FakeCloud::new(&fixture).shared();

    // When
    let report = run_harness(
        test_config(),
        StaticFixtureProvisioner::new(path, "claimcheck"),
        &fake,
        RunOptions::default(),
    )
    .await;

    // Then
    assert_phase(&report, Phase::Provision, PhaseStatus::Passed);
    assert_detail_contains(&report, Phase::Provision, "queue claimcheck-work");
    assert_phase(&report, Phase::Pipeline, PhaseStatus::Passed);
    assert_phase(&report, Phase::Poison, PhaseStatus::Passed);
    assert_verdict(&report, Verdict::Passed);
}
