//! Poison-message redrive.
//!
//! ```text
//! Published -> Delivered(1..=max) -> VisibilityExpired -> RedriveTriggered -> MovedToDeadLetter
//! ```
//!
//! The message is received without being deleted until the queue's maximum
//! receive count is used up. One more receive makes the service move it to
//! the dead-letter queue, where the body must arrive byte-for-byte unchanged.

use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use claimcheck_cloud::queue::MAX_BATCH;
use claimcheck_cloud::{MessageQueue, NotificationTopic, ObjectStore};
use claimcheck_core::config::ClaimcheckConfig;
use claimcheck_core::envelope::TransportEnvelope;
use claimcheck_core::error::{AssertionError, ClaimcheckError};
use claimcheck_core::fixture::ResourceFixture;
use claimcheck_core::metrics as m;
use claimcheck_core::types::ReceivedMessage;

use super::{QueueTarget, Services, exactly_one, receive_within};

/// Last stage the redrive check reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedriveStage {
    Idle,
    Published,
    /// Delivered from the main queue this many times.
    Delivered(u32),
    VisibilityExpired,
    RedriveTriggered,
    MovedToDeadLetter,
}

impl fmt::Display for RedriveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Published => f.write_str("published"),
            Self::Delivered(n) => write!(f, "delivered({n})"),
            Self::VisibilityExpired => f.write_str("visibility_expired"),
            Self::RedriveTriggered => f.write_str("redrive_triggered"),
            Self::MovedToDeadLetter => f.write_str("moved_to_dead_letter"),
        }
    }
}

/// What a passing redrive check verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoisonSummary {
    pub body: String,
    pub deliveries: u32,
    /// Receive count the dead-letter copy reported, when the service sends it.
    pub dead_letter_receive_count: Option<u32>,
}

impl fmt::Display for PoisonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' moved to dead-letter queue after {} deliveries",
            self.body, self.deliveries
        )
    }
}

/// Stage reached plus the outcome.
#[derive(Debug)]
pub struct PoisonResult {
    pub stage: RedriveStage,
    pub outcome: Result<PoisonSummary, ClaimcheckError>,
}

/// Publish an unprocessable message and confirm it lands on the dead-letter queue.
pub async fn run_poison<S, T, Q>(
    services: &Services<S, T, Q>,
    fixture: &ResourceFixture,
    config: &ClaimcheckConfig,
) -> PoisonResult
where
    S: ObjectStore,
    T: NotificationTopic,
    Q: MessageQueue,
{
    let mut stage = RedriveStage::Idle;
    let outcome = drive(services, fixture, config, &mut stage).await;
    match &outcome {
        Ok(summary) => info!(stage = %stage, summary = %summary, "redrive verified"),
        Err(e) => warn!(stage = %stage, error = %e, "redrive check stopped"),
    }
    PoisonResult { stage, outcome }
}

async fn drive<S, T, Q>(
    services: &Services<S, T, Q>,
    fixture: &ResourceFixture,
    config: &ClaimcheckConfig,
    stage: &mut RedriveStage,
) -> Result<PoisonSummary, ClaimcheckError>
where
    S: ObjectStore,
    T: NotificationTopic,
    Q: MessageQueue,
{
    let poison = &config.poison;
    let queue = &*services.queue;
    let main = QueueTarget {
        url: &fixture.queue.url,
        label: m::QUEUE_MAIN,
        name: fixture.queue.display_name(),
    };
    let dead_letter = QueueTarget {
        url: &fixture.dead_letter_queue.url,
        label: m::QUEUE_DEAD_LETTER,
        name: fixture.dead_letter_queue.display_name(),
    };

    let body = format!("{}-{}", poison.message_prefix, Uuid::new_v4());
    let message_id = services.topic.publish(&fixture.topic_arn, &body).await?;
    *stage = RedriveStage::Published;
    info!(body = %body, message_id = %message_id, "poison message published");

    let wait = std::time::Duration::from_secs(poison.receive_wait_secs);
    let visibility = std::time::Duration::from_secs(poison.visibility_wait_secs);

    for delivery in 1..=poison.max_receive_count {
        let messages = receive_within(queue, main, wait, MAX_BATCH).await?;
        let message = exactly_one(messages, main.name)?;
        check_body(&message, &body, main.name)?;
        *stage = RedriveStage::Delivered(delivery);
        info!(
            delivery = delivery,
            receive_count = ?message.receive_count,
            "poison message delivered, leaving it unacknowledged"
        );

        tokio::time::sleep(visibility).await;
        *stage = RedriveStage::VisibilityExpired;
    }

    // The service evaluates the redrive policy on the next receive.
    let redrive_failure = match queue.receive(main.url, MAX_BATCH, wait).await {
        Ok(messages) => {
            info!(returned = messages.len(), "redrive receive issued");
            None
        }
        Err(e) => {
            error!(error = %e, "redrive receive failed");
            Some(e.to_string())
        }
    };
    metrics::counter!(m::RECEIVE_ATTEMPTS_TOTAL, m::LABEL_QUEUE => main.label).increment(1);
    *stage = RedriveStage::RedriveTriggered;

    let budget = std::time::Duration::from_secs(poison.dlq_budget_secs);
    let messages = match receive_within(queue, dead_letter, budget, MAX_BATCH).await {
        Ok(messages) => messages,
        Err(ClaimcheckError::Assertion(AssertionError::NothingReceived {
            queue: name,
            waited_secs,
        })) => {
            return Err(match redrive_failure {
                Some(cause) => AssertionError::RedriveNotObserved {
                    queue: name,
                    waited_secs,
                    cause,
                },
                None => AssertionError::NothingReceived {
                    queue: name,
                    waited_secs,
                },
            }
            .into());
        }
        Err(e) => return Err(e),
    };
    let message = exactly_one(messages, dead_letter.name)?;
    check_body(&message, &body, dead_letter.name)?;
    *stage = RedriveStage::MovedToDeadLetter;

    if let Err(e) = queue.delete(dead_letter.url, &message.receipt_handle).await {
        warn!(error = %e, "failed to delete dead-letter copy");
    }

    Ok(PoisonSummary {
        body,
        deliveries: poison.max_receive_count,
        dead_letter_receive_count: message.receive_count,
    })
}

/// The unwrapped body must equal what was published.
fn check_body(message: &ReceivedMessage, expected: &str, queue: &str) -> Result<(), ClaimcheckError> {
    let actual = TransportEnvelope::unwrap_body(&message.body)?;
    if actual != expected {
        return Err(AssertionError::BodyMismatch {
            queue: queue.to_owned(),
            expected: expected.to_owned(),
            actual,
        }
        .into());
    }
    Ok(())
}
