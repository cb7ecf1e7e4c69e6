//! Claim-check round trip.
//!
//! ```text
//! Idle -> Uploaded -> Published -> NotificationReceived -> Unwrapped -> Downloaded -> Verified
//! ```
//!
//! The payload goes to object storage; only a small event pointing at it
//! travels through the topic and queue. The phase passes when the object the
//! event points at has the digest computed at generation time.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use claimcheck_cloud::{MessageQueue, NotificationTopic, ObjectBody, ObjectStore};
use claimcheck_core::config::{ClaimcheckConfig, PayloadConfig, PublishMode};
use claimcheck_core::envelope::{ClaimCheckData, CloudEvent, InboundEvent, StorageNotification};
use claimcheck_core::error::{AssertionError, ClaimcheckError};
use claimcheck_core::fixture::ResourceFixture;
use claimcheck_core::metrics as m;
use claimcheck_core::payload::{ContentDigest, Payload, PayloadGenerator};
use claimcheck_core::types::ObjectLocator;

use super::{QueueTarget, Services, receive_within};

/// Last stage the pipeline reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Uploaded,
    Published,
    NotificationReceived,
    Unwrapped,
    Downloaded,
    Verified,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Uploaded => "uploaded",
            Self::Published => "published",
            Self::NotificationReceived => "notification_received",
            Self::Unwrapped => "unwrapped",
            Self::Downloaded => "downloaded",
            Self::Verified => "verified",
        };
        f.write_str(s)
    }
}

/// What a passing round trip verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub locator: ObjectLocator,
    pub size: u64,
    pub digest: ContentDigest,
    /// Inner event shape that arrived (`generic` / `storage`).
    pub event_shape: &'static str,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes, md5 {}) verified via {} event",
            self.locator, self.size, self.digest, self.event_shape
        )
    }
}

/// Stage reached plus the outcome.
#[derive(Debug)]
pub struct PipelineResult {
    pub stage: PipelineStage,
    pub outcome: Result<PipelineSummary, ClaimcheckError>,
}

/// Run one claim-check round trip against the fixture's resources.
pub async fn run_pipeline<S, T, Q>(
    services: &Services<S, T, Q>,
    fixture: &ResourceFixture,
    config: &ClaimcheckConfig,
) -> PipelineResult
where
    S: ObjectStore,
    T: NotificationTopic,
    Q: MessageQueue,
{
    let mut stage = PipelineStage::Idle;
    let outcome = drive(services, fixture, config, &mut stage).await;
    match &outcome {
        Ok(summary) => info!(stage = %stage, summary = %summary, "pipeline verified"),
        Err(e) => warn!(stage = %stage, error = %e, "pipeline stopped"),
    }
    PipelineResult { stage, outcome }
}

async fn drive<S, T, Q>(
    services: &Services<S, T, Q>,
    fixture: &ResourceFixture,
    config: &ClaimcheckConfig,
    stage: &mut PipelineStage,
) -> Result<PipelineSummary, ClaimcheckError>
where
    S: ObjectStore,
    T: NotificationTopic,
    Q: MessageQueue,
{
    let payload = generate_payload(&config.payload).await?;
    let expected = payload.digest();
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::PAYLOAD_BYTES).set(payload.size() as f64);

    // Upload
    let locator = ObjectLocator::new(&fixture.bucket_name, Uuid::new_v4().to_string());
    let receipt = services
        .storage
        .put_object(
            &locator.bucket,
            &locator.key,
            ObjectBody::File(payload.path().to_path_buf()),
        )
        .await?;
    *stage = PipelineStage::Uploaded;
    info!(
        locator = %locator,
        size = payload.size(),
        md5 = %expected,
        e_tag = receipt.e_tag.as_deref().unwrap_or("-"),
        "payload uploaded"
    );

    // Publish
    let sent = publish(services, fixture, config, &locator, &payload, receipt.e_tag).await?;
    *stage = PipelineStage::Published;

    // Receive
    let target = QueueTarget {
        url: &fixture.queue.url,
        label: m::QUEUE_MAIN,
        name: fixture.queue.display_name(),
    };
    let messages =
        receive_within(&*services.queue, target, config.pipeline.receive_budget(), 1).await?;
    *stage = PipelineStage::NotificationReceived;
    let Some(message) = messages.into_iter().next() else {
        return Err(AssertionError::NothingReceived {
            queue: target.name.to_owned(),
            waited_secs: config.pipeline.receive_budget_secs,
        }
        .into());
    };

    // Unwrap, then acknowledge
    let event = InboundEvent::from_queue_body(&message.body)?;
    *stage = PipelineStage::Unwrapped;
    services
        .queue
        .delete(&fixture.queue.url, &message.receipt_handle)
        .await?;
    info!(
        shape = event.shape(),
        message_id = message.message_id.as_deref().unwrap_or("-"),
        "notification unwrapped and acknowledged"
    );

    // Resolve
    let resolved = event.locator(&fixture.bucket_name)?;
    if resolved != locator {
        return Err(AssertionError::LocatorMismatch {
            expected: locator.to_string(),
            actual: resolved.to_string(),
        }
        .into());
    }
    if let (Some(sent), InboundEvent::Generic(received)) = (&sent, &event) {
        check_event_fields(sent, received)?;
    }
    if let Some(advertised) = event.advertised_digest()? {
        if advertised != expected {
            return Err(AssertionError::DigestMismatch {
                expected: expected.to_hex(),
                actual: advertised.to_hex(),
            }
            .into());
        }
    }

    // Download & verify
    let fetched = services
        .storage
        .get_object(&resolved.bucket, &resolved.key)
        .await?;
    *stage = PipelineStage::Downloaded;
    let actual = tokio::task::spawn_blocking(move || ContentDigest::compute(&fetched.bytes))
        .await
        .map_err(|e| std::io::Error::other(format!("digest task failed: {e}")))?;

    if actual != expected {
        return Err(AssertionError::DigestMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        }
        .into());
    }
    *stage = PipelineStage::Verified;

    Ok(PipelineSummary {
        locator,
        size: payload.size(),
        digest: expected,
        event_shape: event.shape(),
    })
}

/// Generate the payload on the blocking pool.
async fn generate_payload(config: &PayloadConfig) -> Result<Payload, ClaimcheckError> {
    let mut generator =
        PayloadGenerator::new(config.min_bytes, config.max_bytes).with_seed(config.seed);
    if !config.temp_dir.is_empty() {
        generator = generator.with_temp_dir(&config.temp_dir);
    }
    let payload = tokio::task::spawn_blocking(move || generator.generate())
        .await
        .map_err(|e| std::io::Error::other(format!("payload task failed: {e}")))??;
    Ok(payload)
}

/// Publish the claim for `locator` according to the configured mode.
///
/// Returns the generic event that was sent, if any, so the received copy can
/// be compared field by field.
async fn publish<S, T, Q>(
    services: &Services<S, T, Q>,
    fixture: &ResourceFixture,
    config: &ClaimcheckConfig,
    locator: &ObjectLocator,
    payload: &Payload,
    e_tag: Option<String>,
) -> Result<Option<CloudEvent>, ClaimcheckError>
where
    S: ObjectStore,
    T: NotificationTopic,
    Q: MessageQueue,
{
    let pipeline = &config.pipeline;
    let (message, sent) = match pipeline.publish_mode {
        PublishMode::CloudEvent => {
            let data = ClaimCheckData {
                sender: Some(pipeline.sender.clone()),
                bucket: Some(locator.bucket.clone()),
                key: locator.key.clone(),
                md5sum: Some(payload.digest().to_hex()),
            };
            let event = CloudEvent::claim_check(
                &locator.key,
                &pipeline.event_source,
                &pipeline.event_type,
                &data,
            )?;
            (event.to_json()?, Some(event))
        }
        PublishMode::StorageNotification => {
            let notification = StorageNotification::object_created(locator, payload.size(), e_tag);
            (notification.to_json()?, None)
        }
        PublishMode::BucketNotification => {
            info!(locator = %locator, "relying on bucket notification, nothing published");
            return Ok(None);
        }
    };

    let message_id = services.topic.publish(&fixture.topic_arn, &message).await?;
    info!(
        mode = %pipeline.publish_mode,
        message_id = %message_id,
        topic = %fixture.topic_arn,
        "claim published"
    );
    Ok(sent)
}

/// `id`, `source` and `type` must survive the trip unchanged.
fn check_event_fields(sent: &CloudEvent, received: &CloudEvent) -> Result<(), ClaimcheckError> {
    let fields = [
        ("id", &sent.id, &received.id),
        ("source", &sent.source, &received.source),
        ("type", &sent.event_type, &received.event_type),
    ];
    for (field, expected, actual) in fields {
        if expected != actual {
            return Err(AssertionError::EventField {
                field: field.to_owned(),
                expected: expected.clone(),
                actual: actual.clone(),
            }
            .into());
        }
    }
    Ok(())
}
