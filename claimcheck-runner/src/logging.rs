//! Tracing subscriber setup.
//!
//! The `[general]` section picks the level and the format (`json` lines for
//! CI logs, `pretty` for a terminal). Everything is written to stderr; stdout
//! carries only the final report.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use claimcheck_core::config::GeneralConfig;

/// Install the global subscriber. Call once, before the first event.
///
/// `RUST_LOG` wins over `general.log_level` when set.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;

    let base = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let layer = match config.log_format.as_str() {
        "json" => base.json().flatten_event(true).boxed(),
        "pretty" => base.pretty().boxed(),
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("failed to initialize tracing subscriber")
}
