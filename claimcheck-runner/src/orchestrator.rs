//! Run orchestration -- provisioning, phase sequencing, and guaranteed teardown.
//!
//! The [`Orchestrator`] owns one harness run from start to finish.
//!
//! # Run Order
//!
//! 1. Provision (or load the fixture file)
//! 2. Readiness: wait for the topic-to-queue subscription
//! 3. For each selected phase: hygiene (purge both queues), then the driver
//! 4. Teardown
//!
//! Steps 2-3 run in a spawned task. A panic inside it surfaces as a
//! `JoinError`; the run timeout and SIGINT/SIGTERM abort it. Teardown runs
//! in every case once provisioning has been attempted, unless resources are
//! explicitly kept.
//!
//! An environment error ends the sequence (remaining phases are skipped);
//! an assertion failure only fails its own phase.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use claimcheck_cloud::{MessageQueue, NotificationTopic, ObjectStore};
use claimcheck_core::config::ClaimcheckConfig;
use claimcheck_core::error::ClaimcheckError;
use claimcheck_core::fixture::ResourceFixture;
use claimcheck_core::metrics as m;
use claimcheck_core::poll::PollPolicy;

use crate::drivers::{Services, run_pipeline, run_poison};
use crate::hygiene::purge_queues;
use crate::probe::require_active_subscription;
use crate::provision::Provisioner;
use crate::report::{Phase, PhaseReport, PhaseStatus, RunReport};

/// What to run and whether to keep the stack afterwards.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Verification phases in execution order (`Pipeline`, `Poison`).
    pub phases: Vec<Phase>,
    /// Skip teardown.
    pub keep_resources: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            phases: vec![Phase::Pipeline, Phase::Poison],
            keep_resources: false,
        }
    }
}

/// Progress messages from the phase task.
#[derive(Debug)]
enum PhaseEvent {
    Started(Phase),
    Finished(PhaseReport),
    Cleanup(String),
}

/// One harness run.
pub struct Orchestrator<P, S, T, Q> {
    config: Arc<ClaimcheckConfig>,
    provisioner: P,
    services: Services<S, T, Q>,
    options: RunOptions,
}

impl<P, S, T, Q> Orchestrator<P, S, T, Q>
where
    P: Provisioner,
    S: ObjectStore,
    T: NotificationTopic,
    Q: MessageQueue,
{
    pub fn new(
        config: ClaimcheckConfig,
        provisioner: P,
        services: Services<S, T, Q>,
        options: RunOptions,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provisioner,
            services,
            options,
        }
    }

    /// Run until completion or until SIGINT / SIGTERM.
    pub async fn run(self) -> RunReport {
        self.run_until(shutdown_signal()).await
    }

    /// Run until completion or until `shutdown` resolves with a signal name.
    pub async fn run_until<F>(self, shutdown: F) -> RunReport
    where
        F: Future<Output = &'static str>,
    {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut reports = Vec::new();
        let mut cleanup = Vec::new();
        let mut interrupted_by = None;
        tokio::pin!(shutdown);

        info!(
            run_id = %run_id,
            provisioner = self.provisioner.name(),
            phases = ?self.options.phases,
            "claimcheck run starting"
        );

        // Provision
        let provision_started = Instant::now();
        let provisioned = tokio::select! {
            result = self.provisioner.provision() => Some(result),
            signal = &mut shutdown => {
                warn!(signal = signal, "interrupted during provisioning");
                interrupted_by = Some(signal.to_owned());
                None
            }
        };

        match provisioned {
            Some(Ok(fixture)) => {
                let report = PhaseReport::passed(
                    Phase::Provision,
                    provision_started.elapsed(),
                    format!(
                        "bucket {}, queue {}, dead-letter {}",
                        fixture.bucket_name,
                        fixture.queue.display_name(),
                        fixture.dead_letter_queue.display_name()
                    ),
                );
                record_phase(&mut reports, report);

                let signal = self
                    .run_phases(Arc::new(fixture), &mut reports, &mut cleanup, &mut shutdown)
                    .await;
                if let Some(signal) = signal {
                    interrupted_by = Some(signal.to_owned());
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "provisioning failed");
                let report = PhaseReport::from_error(Phase::Provision, provision_started.elapsed(), &e);
                record_phase(&mut reports, report);
                skip_remaining(&mut reports, &self.options.phases, "provisioning failed");
            }
            None => {
                let report = PhaseReport::aborted(
                    Phase::Provision,
                    provision_started.elapsed(),
                    "interrupted",
                );
                record_phase(&mut reports, report);
                skip_remaining(&mut reports, &self.options.phases, "run interrupted");
            }
        }

        // Teardown
        self.teardown(&mut reports, &mut cleanup).await;

        let report = RunReport::new(run_id, reports, cleanup, interrupted_by, started.elapsed());
        info!(
            run_id = %report.run_id,
            verdict = report.verdict.as_str(),
            cleanup_failures = report.cleanup_failures.len(),
            duration_ms = report.duration_ms,
            "claimcheck run finished"
        );
        report
    }

    /// Spawn the phase task and supervise it.
    ///
    /// Returns the signal name when the run was interrupted.
    async fn run_phases<F>(
        &self,
        fixture: Arc<ResourceFixture>,
        reports: &mut Vec<PhaseReport>,
        cleanup: &mut Vec<String>,
        shutdown: &mut std::pin::Pin<&mut F>,
    ) -> Option<&'static str>
    where
        F: Future<Output = &'static str>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = tokio::spawn(phase_sequence(
            Arc::clone(&self.config),
            self.services.clone(),
            fixture,
            self.options.phases.clone(),
            tx,
        ));

        let deadline = tokio::time::sleep(self.config.general.run_timeout());
        tokio::pin!(deadline);

        let mut in_flight: Option<(Phase, Instant)> = None;
        let mut abort_reason: Option<String> = None;
        let mut interrupted = None;
        let mut joined = false;

        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    apply_event(event, &mut in_flight, reports, cleanup);
                }
                result = &mut handle => {
                    joined = true;
                    if let Err(e) = result {
                        let reason = join_failure(e);
                        error!(reason = %reason, "phase task failed");
                        abort_reason = Some(reason);
                    }
                    break;
                }
                () = &mut deadline => {
                    let reason = format!(
                        "run timeout of {}s exceeded",
                        self.config.general.run_timeout_secs
                    );
                    error!(reason = %reason, "aborting phase task");
                    handle.abort();
                    abort_reason = Some(reason);
                    break;
                }
                signal = shutdown.as_mut() => {
                    warn!(signal = signal, "shutdown signal received, aborting phase task");
                    handle.abort();
                    abort_reason = Some(format!("interrupted by {signal}"));
                    interrupted = Some(signal);
                    break;
                }
            }
        }

        if !joined {
            // Cancellation completes at the task's next suspension point.
            let _ = handle.await;
        }
        while let Ok(event) = rx.try_recv() {
            apply_event(event, &mut in_flight, reports, cleanup);
        }

        if let Some(reason) = abort_reason {
            if let Some((phase, since)) = in_flight.take() {
                record_phase(reports, PhaseReport::aborted(phase, since.elapsed(), reason.clone()));
            }
            let mut pending = vec![Phase::Readiness];
            pending.extend(self.options.phases.iter().copied());
            skip_remaining(reports, &pending, &reason);
        }
        interrupted
    }

    async fn teardown(&self, reports: &mut Vec<PhaseReport>, cleanup: &mut Vec<String>) {
        if self.options.keep_resources {
            warn!("keeping provisioned resources, teardown skipped");
            reports.push(PhaseReport::skipped(Phase::Teardown, "resources kept"));
            return;
        }

        let started = Instant::now();
        match self.provisioner.teardown().await {
            Ok(()) => {
                let detail = format!("{} teardown complete", self.provisioner.name());
                record_phase(reports, PhaseReport::passed(Phase::Teardown, started.elapsed(), detail));
            }
            Err(e) => {
                error!(error = %e, "teardown failed");
                cleanup.push(e.to_string());
                record_phase(reports, PhaseReport::from_error(Phase::Teardown, started.elapsed(), &e));
            }
        }
    }
}

/// Readiness, then hygiene + driver for every selected phase.
async fn phase_sequence<S, T, Q>(
    config: Arc<ClaimcheckConfig>,
    services: Services<S, T, Q>,
    fixture: Arc<ResourceFixture>,
    phases: Vec<Phase>,
    events: mpsc::UnboundedSender<PhaseEvent>,
) where
    S: ObjectStore,
    T: NotificationTopic,
    Q: MessageQueue,
{
    let emit = |event: PhaseEvent| {
        // The receiver only goes away if the orchestrator is gone.
        let _ = events.send(event);
    };

    emit(PhaseEvent::Started(Phase::Readiness));
    let started = Instant::now();
    let policy = PollPolicy::from_secs(
        config.readiness.poll_interval_secs,
        config.readiness.timeout_secs,
    );
    match require_active_subscription(
        &*services.topic,
        &fixture.topic_arn,
        fixture.queue_arn(),
        policy,
    )
    .await
    {
        Ok(readiness) => emit(PhaseEvent::Finished(PhaseReport::passed(
            Phase::Readiness,
            started.elapsed(),
            format!("subscription confirmed after {} probe(s)", readiness.attempts),
        ))),
        Err(e) => {
            emit(PhaseEvent::Finished(PhaseReport::from_error(
                Phase::Readiness,
                started.elapsed(),
                &e,
            )));
            for phase in phases {
                emit(PhaseEvent::Finished(PhaseReport::skipped(phase, "readiness failed")));
            }
            return;
        }
    }

    let settle = std::time::Duration::from_secs(config.hygiene.settle_secs);
    let mut fatal: Option<String> = None;

    for phase in phases {
        if !matches!(phase, Phase::Pipeline | Phase::Poison) {
            continue;
        }
        if let Some(reason) = &fatal {
            emit(PhaseEvent::Finished(PhaseReport::skipped(phase, reason.clone())));
            continue;
        }

        if config.hygiene.enabled {
            emit(PhaseEvent::Started(Phase::Hygiene));
            let started = Instant::now();
            let failures = purge_queues(&*services.queue, &fixture, settle).await;
            for failure in &failures {
                emit(PhaseEvent::Cleanup(failure.to_string()));
            }
            let report = match failures.into_iter().next() {
                None => PhaseReport::passed(
                    Phase::Hygiene,
                    started.elapsed(),
                    format!("queues purged before {phase}"),
                ),
                Some(first) => PhaseReport::from_error(
                    Phase::Hygiene,
                    started.elapsed(),
                    &ClaimcheckError::from(first),
                ),
            };
            emit(PhaseEvent::Finished(report));
        }

        emit(PhaseEvent::Started(phase));
        let started = Instant::now();
        let outcome: Result<String, ClaimcheckError> = match phase {
            Phase::Pipeline => run_pipeline(&services, &fixture, &config)
                .await
                .outcome
                .map(|summary| summary.to_string()),
            _ => run_poison(&services, &fixture, &config)
                .await
                .outcome
                .map(|summary| summary.to_string()),
        };
        let report = match outcome {
            Ok(detail) => PhaseReport::passed(phase, started.elapsed(), detail),
            Err(e) => {
                if e.is_fatal() {
                    error!(phase = %phase, error = %e, "environment error, skipping remaining phases");
                    fatal = Some(format!("{phase} hit an environment error"));
                }
                PhaseReport::from_error(phase, started.elapsed(), &e)
            }
        };
        emit(PhaseEvent::Finished(report));
    }
}

fn apply_event(
    event: PhaseEvent,
    in_flight: &mut Option<(Phase, Instant)>,
    reports: &mut Vec<PhaseReport>,
    cleanup: &mut Vec<String>,
) {
    match event {
        PhaseEvent::Started(phase) => {
            info!(phase = %phase, "phase started");
            *in_flight = Some((phase, Instant::now()));
        }
        PhaseEvent::Finished(report) => {
            if in_flight.is_some_and(|(phase, _)| phase == report.phase) {
                *in_flight = None;
            }
            record_phase(reports, report);
        }
        PhaseEvent::Cleanup(failure) => cleanup.push(failure),
    }
}

/// Log, count, and keep a phase report.
fn record_phase(reports: &mut Vec<PhaseReport>, report: PhaseReport) {
    let phase = report.phase.as_str();
    let result = report.status.as_str();
    metrics::counter!(m::PHASE_RESULTS_TOTAL, m::LABEL_PHASE => phase, m::LABEL_RESULT => result)
        .increment(1);
    if report.status != PhaseStatus::Skipped {
        #[allow(clippy::cast_precision_loss)]
        metrics::histogram!(m::PHASE_DURATION_SECONDS, m::LABEL_PHASE => phase)
            .record(report.duration_ms as f64 / 1000.0);
    }

    match report.status {
        PhaseStatus::Passed => info!(phase = phase, duration_ms = report.duration_ms, "phase passed"),
        PhaseStatus::Skipped => info!(phase = phase, reason = report.detail.as_deref().unwrap_or(""), "phase skipped"),
        PhaseStatus::Failed | PhaseStatus::Error => error!(
            phase = phase,
            status = result,
            detail = report.detail.as_deref().unwrap_or(""),
            "phase did not pass"
        ),
    }
    reports.push(report);
}

/// Mark every phase in `phases` that has no report yet as skipped.
fn skip_remaining(reports: &mut Vec<PhaseReport>, phases: &[Phase], reason: &str) {
    for &phase in phases {
        if !reports.iter().any(|r| r.phase == phase) {
            record_phase(reports, PhaseReport::skipped(phase, reason));
        }
    }
}

fn join_failure(err: JoinError) -> String {
    if err.is_cancelled() {
        return "phase task cancelled".to_owned();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            format!("phase task panicked: {message}")
        }
        Err(e) => format!("phase task failed: {e}"),
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
///
/// If the handlers cannot be installed the run simply cannot be interrupted.
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let handlers = signal(SignalKind::terminate()).and_then(|term| {
        signal(SignalKind::interrupt()).map(|int| (term, int))
    });
    match handlers {
        Ok((mut sigterm, mut sigint)) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        },
        Err(e) => {
            error!(error = %e, "failed to install signal handlers");
            std::future::pending().await
        }
    }
}
