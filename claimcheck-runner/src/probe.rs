//! Readiness probe -- wait until the topic-to-queue subscription is confirmed.

use std::time::Duration;

use tracing::{debug, info, warn};

use claimcheck_cloud::NotificationTopic;
use claimcheck_core::error::{ClaimcheckError, PreconditionError};
use claimcheck_core::metrics as m;
use claimcheck_core::poll::{PollError, PollPolicy, poll_until};

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub confirmed: bool,
    pub attempts: u32,
    pub waited: Duration,
}

/// Poll the topic's subscriptions until one targets `queue_arn` and is confirmed.
///
/// Returns `Ok(false)` when the budget runs out. A failing list call is an
/// environment error and ends the wait immediately.
pub async fn wait_for_active_subscription<T: NotificationTopic>(
    topic: &T,
    topic_arn: &str,
    queue_arn: &str,
    policy: PollPolicy,
) -> Result<bool, ClaimcheckError> {
    probe_subscription(topic, topic_arn, queue_arn, policy)
        .await
        .map(|r| r.confirmed)
}

/// Like [`wait_for_active_subscription`] but turns a timeout into
/// [`PreconditionError::SubscriptionInactive`].
pub async fn require_active_subscription<T: NotificationTopic>(
    topic: &T,
    topic_arn: &str,
    queue_arn: &str,
    policy: PollPolicy,
) -> Result<Readiness, ClaimcheckError> {
    let readiness = probe_subscription(topic, topic_arn, queue_arn, policy).await?;
    if readiness.confirmed {
        return Ok(readiness);
    }
    Err(PreconditionError::SubscriptionInactive {
        topic_arn: topic_arn.to_owned(),
        queue_arn: queue_arn.to_owned(),
        waited_secs: readiness.waited.as_secs(),
        attempts: readiness.attempts,
    }
    .into())
}

async fn probe_subscription<T: NotificationTopic>(
    topic: &T,
    topic_arn: &str,
    queue_arn: &str,
    policy: PollPolicy,
) -> Result<Readiness, ClaimcheckError> {
    let started = tokio::time::Instant::now();

    let result = poll_until(policy, |attempt| async move {
        metrics::counter!(m::READINESS_PROBES_TOTAL).increment(1);
        let subscriptions = topic.list_subscriptions(topic_arn).await?;
        let active = subscriptions.iter().any(|s| s.is_active_for(queue_arn));
        debug!(
            attempt = attempt,
            subscriptions = subscriptions.len(),
            active = active,
            "subscription probe"
        );
        Ok::<_, ClaimcheckError>(active.then_some(attempt))
    })
    .await;

    match result {
        Ok(attempts) => {
            let waited = started.elapsed();
            info!(
                topic_arn = topic_arn,
                queue_arn = queue_arn,
                attempts = attempts,
                waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                "subscription confirmed"
            );
            Ok(Readiness {
                confirmed: true,
                attempts,
                waited,
            })
        }
        Err(PollError::TimedOut { attempts, elapsed }) => {
            warn!(
                topic_arn = topic_arn,
                queue_arn = queue_arn,
                attempts = attempts,
                waited_secs = elapsed.as_secs(),
                "subscription not confirmed within budget"
            );
            Ok(Readiness {
                confirmed: false,
                attempts,
                waited: elapsed,
            })
        }
        Err(PollError::Probe(e)) => Err(e),
    }
}
