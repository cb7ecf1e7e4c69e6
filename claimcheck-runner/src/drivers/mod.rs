//! Phase drivers and the shared helpers they use.
//!
//! - [`pipeline`]: upload, publish, receive, unwrap, download, verify
//! - [`poison`]: publish an opaque message, let it expire, observe redrive

pub mod pipeline;
pub mod poison;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use claimcheck_cloud::{AwsClients, MessageQueue, NotificationTopic, ObjectStore};
use claimcheck_cloud::{S3ObjectStore, SnsTopic, SqsQueue};
use claimcheck_core::config::MAX_LONG_POLL_SECS;
use claimcheck_core::error::{AssertionError, ClaimcheckError};
use claimcheck_core::metrics as m;
use claimcheck_core::poll::{PollError, PollPolicy, poll_until};
use claimcheck_core::types::ReceivedMessage;

pub use pipeline::{PipelineResult, PipelineStage, PipelineSummary, run_pipeline};
pub use poison::{PoisonResult, PoisonSummary, RedriveStage, run_poison};

/// Pause between receive calls that came back empty before the budget ran out.
const RECEIVE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Cloud services shared by the phase task and the orchestrator.
pub struct Services<S, T, Q> {
    pub storage: Arc<S>,
    pub topic: Arc<T>,
    pub queue: Arc<Q>,
}

impl<S, T, Q> Clone for Services<S, T, Q> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            topic: Arc::clone(&self.topic),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<S: ObjectStore, T: NotificationTopic, Q: MessageQueue> Services<S, T, Q> {
    pub fn new(storage: Arc<S>, topic: Arc<T>, queue: Arc<Q>) -> Self {
        Self {
            storage,
            topic,
            queue,
        }
    }
}

impl From<AwsClients> for Services<S3ObjectStore, SnsTopic, SqsQueue> {
    fn from(clients: AwsClients) -> Self {
        Self::new(
            Arc::new(clients.storage),
            Arc::new(clients.topic),
            Arc::new(clients.queue),
        )
    }
}

/// A queue addressed by URL plus the names used in logs and metrics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueTarget<'a> {
    pub url: &'a str,
    /// Metric label (`main` / `dead_letter`).
    pub label: &'static str,
    /// Display name for logs and assertion messages.
    pub name: &'a str,
}

/// Long-poll `target` until at least one message arrives or `budget` is spent.
///
/// Each call waits at most the service long-poll maximum or the remaining
/// budget, whichever is smaller. An empty result after the budget is an
/// [`AssertionError::NothingReceived`].
pub(crate) async fn receive_within<Q: MessageQueue>(
    queue: &Q,
    target: QueueTarget<'_>,
    budget: Duration,
    max_messages: u32,
) -> Result<Vec<ReceivedMessage>, ClaimcheckError> {
    let started = tokio::time::Instant::now();
    let max_wait = Duration::from_secs(MAX_LONG_POLL_SECS);
    let policy = PollPolicy::new(RECEIVE_RETRY_INTERVAL, budget);

    let result = poll_until(policy, |attempt| async move {
        let wait = budget.saturating_sub(started.elapsed()).min(max_wait);
        metrics::counter!(m::RECEIVE_ATTEMPTS_TOTAL, m::LABEL_QUEUE => target.label).increment(1);

        let messages = queue.receive(target.url, max_messages, wait).await?;
        debug!(
            queue = target.name,
            attempt = attempt,
            wait_secs = wait.as_secs(),
            received = messages.len(),
            "receive"
        );
        if messages.is_empty() {
            return Ok(None);
        }
        metrics::counter!(m::MESSAGES_RECEIVED_TOTAL, m::LABEL_QUEUE => target.label)
            .increment(messages.len() as u64);
        Ok::<_, ClaimcheckError>(Some(messages))
    })
    .await;

    match result {
        Ok(messages) => Ok(messages),
        Err(PollError::TimedOut { elapsed, .. }) => Err(AssertionError::NothingReceived {
            queue: target.name.to_owned(),
            waited_secs: elapsed.as_secs(),
        }
        .into()),
        Err(PollError::Probe(e)) => Err(e),
    }
}

/// Require exactly one message; anything else is an [`AssertionError::MessageCount`].
pub(crate) fn exactly_one(
    mut messages: Vec<ReceivedMessage>,
    queue: &str,
) -> Result<ReceivedMessage, ClaimcheckError> {
    if messages.len() != 1 {
        return Err(AssertionError::MessageCount {
            queue: queue.to_owned(),
            expected: 1,
            actual: messages.len(),
        }
        .into());
    }
    messages.pop().ok_or_else(|| {
        AssertionError::MessageCount {
            queue: queue.to_owned(),
            expected: 1,
            actual: 0,
        }
        .into()
    })
}
