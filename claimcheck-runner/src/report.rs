//! Run report -- per-phase outcomes, cleanup failures and the final verdict.
//!
//! The verdict is the worst outcome across verification phases. Cleanup
//! phases (hygiene, teardown) are listed but never change the verdict.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use claimcheck_core::error::{ClaimcheckError, ErrorKind};

use crate::output::Render;

/// Harness phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Provision resources and load the fixture.
    Provision,
    /// Wait for the topic-to-queue subscription.
    Readiness,
    /// Purge queues before a verification phase.
    Hygiene,
    /// Claim-check round trip.
    Pipeline,
    /// Poison message redrive.
    Poison,
    /// Destroy provisioned resources.
    Teardown,
}

impl Phase {
    /// Cleanup phases are reported but do not affect the verdict.
    pub fn is_cleanup(&self) -> bool {
        matches!(self, Self::Hygiene | Self::Teardown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Readiness => "readiness",
            Self::Hygiene => "hygiene",
            Self::Pipeline => "pipeline",
            Self::Poison => "poison",
            Self::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Passed,
    /// An assertion did not hold.
    Failed,
    /// Environment or precondition problem; later phases were skipped.
    Error,
    /// Not run because an earlier phase hit an environment error.
    Skipped,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report line for one phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub duration_ms: u64,
    /// Error classification when the phase did not pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Human-readable detail: what was verified, or what went wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PhaseReport {
    pub fn passed(phase: Phase, duration: Duration, detail: impl Into<String>) -> Self {
        Self {
            phase,
            status: PhaseStatus::Passed,
            duration_ms: millis(duration),
            error_kind: None,
            detail: Some(detail.into()),
        }
    }

    /// Builds a report from a harness error, classifying it by [`ErrorKind`].
    pub fn from_error(phase: Phase, duration: Duration, error: &ClaimcheckError) -> Self {
        let kind = error.kind();
        let status = match kind {
            ErrorKind::Assertion => PhaseStatus::Failed,
            ErrorKind::Environment => PhaseStatus::Error,
            ErrorKind::Cleanup => PhaseStatus::Failed,
        };
        Self {
            phase,
            status,
            duration_ms: millis(duration),
            error_kind: Some(kind),
            detail: Some(error.to_string()),
        }
    }

    /// A phase that was cut short (panic, timeout, interrupt).
    pub fn aborted(phase: Phase, duration: Duration, detail: impl Into<String>) -> Self {
        Self {
            phase,
            status: PhaseStatus::Error,
            duration_ms: millis(duration),
            error_kind: Some(ErrorKind::Environment),
            detail: Some(detail.into()),
        }
    }

    pub fn skipped(phase: Phase, reason: impl Into<String>) -> Self {
        Self {
            phase,
            status: PhaseStatus::Skipped,
            duration_ms: 0,
            error_kind: None,
            detail: Some(reason.into()),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Error,
    Interrupted,
}

impl Verdict {
    /// Process exit code for the verdict.
    ///
    /// | Code | Meaning                                  |
    /// |------|------------------------------------------|
    /// | 0    | All selected phases passed               |
    /// | 1    | At least one assertion failed            |
    /// | 2    | Environment / configuration error        |
    /// | 130  | Interrupted by SIGINT / SIGTERM          |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::Failed => 1,
            Self::Error => 2,
            Self::Interrupted => 130,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Final report of a harness run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub verdict: Verdict,
    pub phases: Vec<PhaseReport>,
    /// Purge and teardown failures. Listed for operators; never change the verdict.
    pub cleanup_failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted_by: Option<String>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Assemble a report and compute its verdict.
    pub fn new(
        run_id: impl Into<String>,
        phases: Vec<PhaseReport>,
        cleanup_failures: Vec<String>,
        interrupted_by: Option<String>,
        duration: Duration,
    ) -> Self {
        let verdict = compute_verdict(&phases, interrupted_by.is_some());
        Self {
            run_id: run_id.into(),
            verdict,
            phases,
            cleanup_failures,
            interrupted_by,
            duration_ms: millis(duration),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }

    /// Status recorded for a phase, if it appears in the report.
    pub fn status_of(&self, phase: Phase) -> Option<PhaseStatus> {
        self.phases
            .iter()
            .rev()
            .find(|r| r.phase == phase)
            .map(|r| r.status)
    }
}

/// Worst outcome across verification phases wins.
pub fn compute_verdict(phases: &[PhaseReport], interrupted: bool) -> Verdict {
    if interrupted {
        return Verdict::Interrupted;
    }
    phases
        .iter()
        .filter(|r| !r.phase.is_cleanup())
        .map(|r| match r.status {
            PhaseStatus::Passed | PhaseStatus::Skipped => Verdict::Passed,
            PhaseStatus::Failed => Verdict::Failed,
            PhaseStatus::Error => Verdict::Error,
        })
        .max()
        .unwrap_or(Verdict::Passed)
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "claimcheck run {}", self.run_id)?;
        writeln!(w, "{:<12} {:<10} {:>10}  {}", "PHASE", "STATUS", "TIME", "DETAIL")?;
        writeln!(w, "{}", "-".repeat(72))?;

        for r in &self.phases {
            let status = match r.status {
                PhaseStatus::Passed => r.status.as_str().green(),
                PhaseStatus::Failed => r.status.as_str().red(),
                PhaseStatus::Error => r.status.as_str().red().bold(),
                PhaseStatus::Skipped => r.status.as_str().yellow(),
            };
            writeln!(
                w,
                "{:<12} {:<10} {:>8}ms  {}",
                r.phase.as_str(),
                status,
                r.duration_ms,
                r.detail.as_deref().unwrap_or("")
            )?;
        }

        if !self.cleanup_failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Cleanup failures:".yellow().bold())?;
            for failure in &self.cleanup_failures {
                writeln!(w, "  - {failure}")?;
            }
        }

        writeln!(w)?;
        let verdict = match self.verdict {
            Verdict::Passed => self.verdict.as_str().green().bold(),
            Verdict::Failed | Verdict::Error => self.verdict.as_str().red().bold(),
            Verdict::Interrupted => self.verdict.as_str().yellow().bold(),
        };
        match &self.interrupted_by {
            Some(signal) => writeln!(w, "Verdict: {verdict} ({signal})")?,
            None => writeln!(w, "Verdict: {verdict}")?,
        }
        Ok(())
    }
}
