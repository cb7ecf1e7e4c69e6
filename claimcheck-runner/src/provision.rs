//! Infrastructure provisioning -- acquire the stack, read its outputs, destroy it.
//!
//! [`TofuProvisioner`] drives an OpenTofu / Terraform working directory:
//!
//! 1. `<binary> init -input=false`
//! 2. `<binary> apply -input=false -auto-approve`
//! 3. `<binary> output -json` (parsed into a [`ResourceFixture`])
//! 4. `<binary> destroy -input=false -auto-approve` at teardown
//!
//! A command whose combined output matches one of the configured
//! retryable-error patterns is retried after a fixed backoff.
//!
//! [`StaticFixtureProvisioner`] reads a pre-generated output document
//! instead and never tears anything down.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::{info, warn};

use claimcheck_core::config::ProvisionConfig;
use claimcheck_core::error::{ClaimcheckError, CleanupError, ConfigError, PreconditionError};
use claimcheck_core::fixture::ResourceFixture;

/// Number of trailing output lines kept in error messages.
const ERROR_TAIL_LINES: usize = 20;

/// Acquires and releases the resources under test.
pub trait Provisioner: Send + Sync + 'static {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Create (or locate) the resources and return their identifiers.
    fn provision(&self) -> impl Future<Output = Result<ResourceFixture, ClaimcheckError>> + Send;

    /// Release whatever [`provision`](Self::provision) created.
    fn teardown(&self) -> impl Future<Output = Result<(), ClaimcheckError>> + Send;
}

/// Provisioner backed by the `tofu` / `terraform` CLI.
pub struct TofuProvisioner {
    binary: String,
    working_dir: PathBuf,
    output_key: String,
    max_retries: u32,
    retry_backoff: Duration,
    retryable: Vec<Regex>,
}

impl TofuProvisioner {
    /// Build from the `[provision]` section, compiling the retry patterns.
    pub fn from_config(config: &ProvisionConfig) -> Result<Self, ClaimcheckError> {
        let retryable = config
            .retryable_errors
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
                    field: "provision.retryable_errors".to_owned(),
                    reason: format!("'{pattern}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            binary: config.binary.clone(),
            working_dir: PathBuf::from(&config.working_dir),
            output_key: config.output_key.clone(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_secs(config.retry_backoff_secs),
            retryable,
        })
    }

    /// Whether the output of a failed command matches a retryable pattern.
    pub fn is_retryable(&self, output: &str) -> bool {
        self.retryable.iter().any(|re| re.is_match(output))
    }

    /// Run a subcommand, retrying on retryable failures. Returns stdout.
    async fn run_with_retry(&self, args: &[&str]) -> Result<String, String> {
        let mut attempt = 0u32;
        loop {
            match self.run_once(args).await {
                Ok(stdout) => return Ok(stdout),
                Err(output) if attempt < self.max_retries && self.is_retryable(&output) => {
                    attempt += 1;
                    warn!(
                        binary = %self.binary,
                        command = args.first().copied().unwrap_or_default(),
                        attempt = attempt,
                        backoff_secs = self.retry_backoff.as_secs(),
                        "retryable provisioning error, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(output) => return Err(tail(&output, ERROR_TAIL_LINES)),
            }
        }
    }

    /// Run a subcommand once. `Err` carries the combined output.
    async fn run_once(&self, args: &[&str]) -> Result<String, String> {
        info!(binary = %self.binary, args = ?args, dir = %self.working_dir.display(), "running provisioning command");

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to spawn '{}': {}", self.binary, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("{} ({})\n{}{}", args.join(" "), output.status, stdout, stderr))
    }

    async fn step(&self, args: &[&str]) -> Result<String, ClaimcheckError> {
        self.run_with_retry(args).await.map_err(|detail| {
            PreconditionError::Provisioning(format!("{} {}", self.binary, detail)).into()
        })
    }
}

impl Provisioner for TofuProvisioner {
    fn name(&self) -> &'static str {
        "tofu"
    }

    async fn provision(&self) -> Result<ResourceFixture, ClaimcheckError> {
        self.step(&["init", "-input=false"]).await?;
        self.step(&["apply", "-input=false", "-auto-approve"]).await?;
        let document = self.step(&["output", "-json"]).await?;

        let fixture = ResourceFixture::parse(&document, &self.output_key)?;
        info!(
            bucket = %fixture.bucket_name,
            queue = %fixture.queue.display_name(),
            topic = %fixture.topic_arn,
            "stack provisioned"
        );
        Ok(fixture)
    }

    async fn teardown(&self) -> Result<(), ClaimcheckError> {
        self.run_with_retry(&["destroy", "-input=false", "-auto-approve"])
            .await
            .map_err(|detail| CleanupError::Teardown(format!("{} {}", self.binary, detail)))?;
        info!(binary = %self.binary, "stack destroyed");
        Ok(())
    }
}

/// Provisioner that reads an existing output document.
pub struct StaticFixtureProvisioner {
    path: PathBuf,
    output_key: String,
}

impl StaticFixtureProvisioner {
    pub fn new(path: impl Into<PathBuf>, output_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            output_key: output_key.into(),
        }
    }
}

impl Provisioner for StaticFixtureProvisioner {
    fn name(&self) -> &'static str {
        "fixture-file"
    }

    async fn provision(&self) -> Result<ResourceFixture, ClaimcheckError> {
        let fixture = ResourceFixture::from_file(&self.path, &self.output_key).await?;
        info!(path = %self.path.display(), bucket = %fixture.bucket_name, "fixture loaded");
        Ok(fixture)
    }

    async fn teardown(&self) -> Result<(), ClaimcheckError> {
        Ok(())
    }
}

/// Provisioner selected from configuration.
pub enum AnyProvisioner {
    Tofu(TofuProvisioner),
    Static(StaticFixtureProvisioner),
}

impl AnyProvisioner {
    /// `provision.enabled` picks the CLI provisioner, otherwise the fixture file.
    pub fn from_config(config: &ProvisionConfig) -> Result<Self, ClaimcheckError> {
        if config.enabled {
            Ok(Self::Tofu(TofuProvisioner::from_config(config)?))
        } else {
            Ok(Self::Static(StaticFixtureProvisioner::new(
                &config.fixture_path,
                &config.output_key,
            )))
        }
    }
}

impl Provisioner for AnyProvisioner {
    fn name(&self) -> &'static str {
        match self {
            Self::Tofu(p) => p.name(),
            Self::Static(p) => p.name(),
        }
    }

    async fn provision(&self) -> Result<ResourceFixture, ClaimcheckError> {
        match self {
            Self::Tofu(p) => p.provision().await,
            Self::Static(p) => p.provision().await,
        }
    }

    async fn teardown(&self) -> Result<(), ClaimcheckError> {
        match self {
            Self::Tofu(p) => p.teardown().await,
            Self::Static(p) => p.teardown().await,
        }
    }
}

/// Last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
