//! Fixture, config and provisioner builders for E2E tests.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use claimcheck_core::config::ClaimcheckConfig;
use claimcheck_core::error::{ClaimcheckError, CleanupError, PreconditionError};
use claimcheck_core::fixture::{QueueRef, ResourceFixture};
use claimcheck_runner::{Orchestrator, Provisioner, RunOptions, RunReport, Services};

use super::fake_cloud::FakeCloud;

/// Payload size used by tests that don't care about size.
#[allow(dead_code)]
pub const SMALL_PAYLOAD: u64 = 256 * 1024;

/// Identifiers of a provisioned stack in us-east-1.
pub fn test_fixture() -> ResourceFixture {
    ResourceFixture {
        bucket_name: "claimcheck-payloads".to_owned(),
        bucket_arn: Some("arn:aws:s3:::claimcheck-payloads".to_owned()),
        queue: QueueRef {
            name: Some("claimcheck-work".to_owned()),
            arn: Some("arn:aws:sqs:us-east-1:123456789012:claimcheck-work".to_owned()),
            url: "https://sqs.us-east-1.amazonaws.com/123456789012/claimcheck-work".to_owned(),
        },
        dead_letter_queue: QueueRef {
            name: Some("claimcheck-work-dlq".to_owned()),
            arn: Some("arn:aws:sqs:us-east-1:123456789012:claimcheck-work-dlq".to_owned()),
            url: "https://sqs.us-east-1.amazonaws.com/123456789012/claimcheck-work-dlq".to_owned(),
        },
        topic_arn: "arn:aws:sns:us-east-1:123456789012:claimcheck-events".to_owned(),
        topic_name: Some("claimcheck-events".to_owned()),
        kms_key_arn: None,
    }
}

/// The same fixture as `<binary> output -json` prints it.
#[allow(dead_code)]
pub fn output_document(fixture: &ResourceFixture) -> serde_json::Value {
    serde_json::json!({
        "claimcheck": {
            "sensitive": false,
            "type": ["object", {}],
            "value": {
                "claimcheck_s3": {
                    "arn": fixture.bucket_arn,
                    "name": fixture.bucket_name,
                },
                "claimcheck_sqs": {
                    "arn": fixture.queue.arn,
                    "name": fixture.queue.name,
                    "url": fixture.queue.url,
                },
                "claimcheck_sqs_dlq": {
                    "arn": fixture.dead_letter_queue.arn,
                    "name": fixture.dead_letter_queue.name,
                    "url": fixture.dead_letter_queue.url,
                },
                "claimcheck_sns": {
                    "topic": fixture.topic_name,
                    "arn": fixture.topic_arn,
                },
            }
        }
    })
}

/// Defaults with small payloads and a fixture file in place of provisioning.
pub fn test_config() -> ClaimcheckConfig {
    let mut config = ClaimcheckConfig::default();
    config.provision.enabled = false;
    config.provision.fixture_path = "outputs.json".to_owned();
    config.payload.min_bytes = SMALL_PAYLOAD;
    config.payload.max_bytes = SMALL_PAYLOAD;
    config
}

/// Provisioner returning a canned fixture and counting teardowns.
#[derive(Clone)]
pub struct FakeProvisioner {
    fixture: Option<ResourceFixture>,
    provision_delay: Duration,
    fail_teardown: bool,
    provisions: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeProvisioner {
    pub fn ok(fixture: ResourceFixture) -> Self {
        Self {
            fixture: Some(fixture),
            provision_delay: Duration::ZERO,
            fail_teardown: false,
            provisions: Arc::new(AtomicUsize::new(0)),
            teardowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `apply` fails after partially creating resources.
    pub fn failing() -> Self {
        Self {
            fixture: None,
            ..Self::ok(test_fixture())
        }
    }

    pub fn with_provision_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = delay;
        self
    }

    pub fn with_failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    pub fn provision_count(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

impl Provisioner for FakeProvisioner {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn provision(&self) -> Result<ResourceFixture, ClaimcheckError> {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        if !self.provision_delay.is_zero() {
            tokio::time::sleep(self.provision_delay).await;
        }
        self.fixture.clone().ok_or_else(|| {
            PreconditionError::Provisioning(
                "tofu apply (exit status: 1)\nError: creating SQS Queue: AccessDenied".to_owned(),
            )
            .into()
        })
    }

    async fn teardown(&self) -> Result<(), ClaimcheckError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        if self.fail_teardown {
            return Err(CleanupError::Teardown(
                "tofu destroy (exit status: 1)\nError: deleting S3 Bucket: BucketNotEmpty".to_owned(),
            )
            .into());
        }
        Ok(())
    }
}

/// Services backed by one shared fake.
pub fn services(fake: &Arc<FakeCloud>) -> Services<FakeCloud, FakeCloud, FakeCloud> {
    Services::new(Arc::clone(fake), Arc::clone(fake), Arc::clone(fake))
}

/// Run the harness to completion without a shutdown signal.
#[allow(dead_code)]
pub async fn run_harness<P: Provisioner>(
    config: ClaimcheckConfig,
    provisioner: P,
    fake: &Arc<FakeCloud>,
    options: RunOptions,
) -> RunReport {
    run_harness_until(config, provisioner, fake, options, std::future::pending()).await
}

/// Run the harness until `shutdown` resolves.
pub async fn run_harness_until<P, F>(
    config: ClaimcheckConfig,
    provisioner: P,
    fake: &Arc<FakeCloud>,
    options: RunOptions,
    shutdown: F,
) -> RunReport
where
    P: Provisioner,
    F: Future<Output = &'static str>,
{
    Orchestrator::new(config, provisioner, services(fake), options)
        .run_until(shutdown)
        .await
}
