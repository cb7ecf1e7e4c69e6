//! CLI argument definitions for claimcheck-runner.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use claimcheck_core::config::ClaimcheckConfig;

use crate::output::OutputFormat;
use crate::report::Phase;

/// End-to-end verification of a claim-check messaging stack.
///
/// Provisions the stack, uploads a large payload, publishes a notification,
/// receives it from the work queue and verifies the payload digest, then
/// checks that a poison message is redriven to the dead-letter queue.
#[derive(Parser, Debug)]
#[command(name = "claimcheck-runner")]
#[command(version, about, long_about = None)]
pub struct RunnerCli {
    /// Path to claimcheck.toml. Defaults are used when omitted and
    /// ./claimcheck.toml does not exist.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Use an existing provisioning output document instead of running the
    /// provisioning tool. Resources are not destroyed afterwards.
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Skip teardown after the run.
    #[arg(long)]
    pub keep_resources: bool,

    /// Phases to run (repeatable). Defaults to all.
    #[arg(long = "phase", value_enum)]
    pub phases: Vec<PhaseArg>,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Validate configuration and exit without touching any resources.
    #[arg(long)]
    pub validate: bool,
}

/// Selectable verification phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
    /// Upload, publish, receive and verify the payload digest.
    Pipeline,
    /// Poison message redrive to the dead-letter queue.
    Poison,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Pipeline => Phase::Pipeline,
            PhaseArg::Poison => Phase::Poison,
        }
    }
}

impl RunnerCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut ClaimcheckConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(fixture) = &self.fixture {
            config.provision.enabled = false;
            config.provision.fixture_path = fixture.display().to_string();
        }
    }

    /// Selected phases in execution order, without duplicates.
    pub fn selected_phases(&self) -> Vec<Phase> {
        let all = [Phase::Pipeline, Phase::Poison];
        if self.phases.is_empty() {
            return all.to_vec();
        }
        all.into_iter()
            .filter(|phase| self.phases.iter().any(|arg| Phase::from(*arg) == *phase))
            .collect()
    }
}
