//! Report assertion helpers for E2E tests.

use claimcheck_runner::{Phase, PhaseReport, PhaseStatus, RunReport, Verdict};

/// The report line for `phase`.
///
/// # Panics
///
/// Panics if the phase is not in the report.
pub fn phase_report(report: &RunReport, phase: Phase) -> &PhaseReport {
    report
        .phases
        .iter()
        .rev()
        .find(|r| r.phase == phase)
        .unwrap_or_else(|| panic!("phase {phase} missing from report: {:#?}", report.phases))
}

/// Assert the status of `phase`.
pub fn assert_phase(report: &RunReport, phase: Phase, expected: PhaseStatus) {
    let actual = phase_report(report, phase);
    assert_eq!(
        actual.status, expected,
        "phase {phase}: expected {expected}, got {} ({:?})",
        actual.status, actual.detail
    );
}

/// Assert the verdict and its exit code.
pub fn assert_verdict(report: &RunReport, expected: Verdict) {
    assert_eq!(
        report.verdict, expected,
        "unexpected verdict, phases: {:#?}",
        report.phases
    );
    assert_eq!(report.exit_code(), expected.exit_code());
}

/// Assert that the detail of `phase` mentions `needle`.
#[allow(dead_code)]
pub fn assert_detail_contains(report: &RunReport, phase: Phase, needle: &str) {
    let detail = phase_report(report, phase).detail.clone().unwrap_or_default();
    assert!(
        detail.contains(needle),
        "phase {phase} detail '{detail}' does not contain '{needle}'"
    );
}
