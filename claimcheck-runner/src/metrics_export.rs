//! Prometheus textfile export.
//!
//! Installs the `metrics-exporter-prometheus` recorder without an HTTP
//! listener; the rendered exposition is written to a textfile at the end
//! of the run for a node-exporter textfile collector to pick up.
//!
//! # Usage
//!
//! ```ignore
//! let exporter = MetricsExporter::install(&config.metrics)?;
//! // ... run ...
//! exporter.write_textfile().await?;
//! ```

use std::path::PathBuf;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use claimcheck_core::config::MetricsConfig;
use claimcheck_core::metrics as m;

/// Installed recorder plus the textfile destination.
pub struct MetricsExporter {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl MetricsExporter {
    /// Install the global recorder and register metric descriptions.
    ///
    /// Call once per process.
    pub fn install(config: &MetricsConfig) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(m::PHASE_DURATION_SECONDS.to_owned()),
                &m::PHASE_DURATION_BUCKETS,
            )
            .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

        m::describe_all();
        metrics::gauge!(m::BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

        tracing::info!(path = %config.textfile_path, "Prometheus metrics recorder installed");

        Ok(Self {
            handle,
            path: PathBuf::from(&config.textfile_path),
        })
    }

    /// Render the current metrics in Prometheus exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition to the textfile atomically (write + rename).
    pub async fn write_textfile(&self) -> Result<()> {
        let tmp = self.path.with_extension("prom.tmp");
        tokio::fs::write(&tmp, self.render()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::info!(path = %self.path.display(), "metrics textfile written");
        Ok(())
    }
}
