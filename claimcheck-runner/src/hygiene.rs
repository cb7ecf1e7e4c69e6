//! Queue hygiene: purge the main and dead-letter queues before a phase.

use std::time::Duration;

use tracing::{error, info};

use claimcheck_cloud::queue::MAX_BATCH;
use claimcheck_cloud::{CloudError, MessageQueue};
use claimcheck_core::error::CleanupError;
use claimcheck_core::fixture::ResourceFixture;
use claimcheck_core::metrics as m;
use claimcheck_core::types::PurgeOutcome;

/// Long-poll wait per drain receive; a zero wait samples only part of the queue.
const DRAIN_WAIT: Duration = Duration::from_secs(1);

/// Upper bound on drain batches for one queue.
const MAX_DRAIN_BATCHES: usize = 100;

/// Purge both queues, then wait `settle` for the purge to take effect.
///
/// Failures never abort the run; they are returned for the report.
/// The settle delay applies even when a purge failed.
pub async fn purge_queues<Q: MessageQueue>(
    queue: &Q,
    fixture: &ResourceFixture,
    settle: Duration,
) -> Vec<CleanupError> {
    let targets = [
        (m::QUEUE_MAIN, &fixture.queue),
        (m::QUEUE_DEAD_LETTER, &fixture.dead_letter_queue),
    ];

    let mut failures = Vec::new();
    for (label, target) in targets {
        match purge_one(queue, &target.url).await {
            Ok((result, drained)) => {
                metrics::counter!(m::PURGES_TOTAL, m::LABEL_QUEUE => label, m::LABEL_RESULT => result)
                    .increment(1);
                info!(
                    queue = target.display_name(),
                    result = result,
                    drained = drained,
                    "queue purged"
                );
            }
            Err(e) => {
                metrics::counter!(m::PURGES_TOTAL, m::LABEL_QUEUE => label, m::LABEL_RESULT => "failed")
                    .increment(1);
                error!(queue = target.display_name(), error = %e, "queue purge failed");
                failures.push(CleanupError::Purge {
                    queue: target.display_name().to_owned(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    failures
}

/// Purge `url`; when the service refuses because a purge ran in the last
/// 60 seconds, delete what is left by hand.
async fn purge_one<Q: MessageQueue>(
    queue: &Q,
    url: &str,
) -> Result<(&'static str, usize), CloudError> {
    match queue.purge(url).await? {
        PurgeOutcome::Purged => Ok(("purged", 0)),
        PurgeOutcome::AlreadyInProgress => {
            let drained = drain(queue, url).await?;
            Ok(("drained", drained))
        }
    }
}

/// Receive and delete until a receive comes back empty.
///
/// Messages hidden by a visibility timeout are out of reach here.
async fn drain<Q: MessageQueue>(queue: &Q, url: &str) -> Result<usize, CloudError> {
    let mut drained = 0;
    for _ in 0..MAX_DRAIN_BATCHES {
        let batch = queue.receive(url, MAX_BATCH, DRAIN_WAIT).await?;
        if batch.is_empty() {
            break;
        }
        for message in &batch {
            queue.delete(url, &message.receipt_handle).await?;
        }
        drained += batch.len();
    }
    Ok(drained)
}
