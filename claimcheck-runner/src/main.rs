//! claimcheck-runner -- end-to-end verification of a claim-check messaging stack.
//!
//! Loads configuration, selects a provisioner, connects to the cloud
//! services, runs the selected phases and prints the report.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use claimcheck_cloud::AwsClients;
use claimcheck_core::config::ClaimcheckConfig;
use claimcheck_runner::cli::RunnerCli;
use claimcheck_runner::error::RunnerError;
use claimcheck_runner::logging::init_tracing;
use claimcheck_runner::metrics_export::MetricsExporter;
use claimcheck_runner::output::OutputWriter;
use claimcheck_runner::{AnyProvisioner, Orchestrator, RunOptions, Services};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "claimcheck.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = RunnerCli::parse();

    match run(cli).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("error: {e}");
            exit_code(e.exit_code())
        }
    }
}

async fn run(cli: RunnerCli) -> Result<i32, RunnerError> {
    let mut config = load_config(cli.config.as_deref()).await?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| RunnerError::Config(e.to_string()))?;

    init_tracing(&config.general).map_err(|e| RunnerError::Setup(e.to_string()))?;

    if cli.validate {
        tracing::info!("configuration is valid");
        println!("configuration is valid");
        return Ok(0);
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "claimcheck-runner starting");

    let exporter = if config.metrics.enabled {
        Some(MetricsExporter::install(&config.metrics).map_err(|e| RunnerError::Setup(e.to_string()))?)
    } else {
        None
    };

    let provisioner = AnyProvisioner::from_config(&config.provision)?;
    let services = Services::from(AwsClients::connect(&config.aws).await);
    let options = RunOptions {
        phases: cli.selected_phases(),
        keep_resources: cli.keep_resources,
    };

    let report = Orchestrator::new(config, provisioner, services, options)
        .run()
        .await;

    OutputWriter::new(cli.output).render(&report)?;

    if let Some(exporter) = exporter {
        if let Err(e) = exporter.write_textfile().await {
            tracing::error!(error = %e, "failed to write metrics textfile");
        }
    }

    Ok(report.exit_code())
}

/// Explicit path, then `./claimcheck.toml`, then defaults. Environment
/// overrides apply in every case; validation happens after CLI overrides.
async fn load_config(path: Option<&Path>) -> Result<ClaimcheckConfig, RunnerError> {
    let path: Option<PathBuf> = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            tokio::fs::try_exists(&default)
                .await
                .unwrap_or(false)
                .then_some(default)
        }
    };

    let mut config = match path {
        Some(p) => ClaimcheckConfig::from_file(&p)
            .await
            .map_err(|e| RunnerError::Config(e.to_string()))?,
        None => ClaimcheckConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
