//! Logging and metrics setup.
//!
//! Storage and LLM code emit `metrics` counters unconditionally; they are
//! only exported when a recorder is installed here.

mod logging;
mod metrics;

pub use logging::build_filter;
pub use metrics::install_prometheus;

use crate::Result;
use crate::config::EnrollaConfig;
use metrics_exporter_prometheus::PrometheusHandle;

/// Options from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// `--verbose` was given.
    pub verbose: bool,
    /// Start the Prometheus exporter if enabled in config.
    pub metrics: bool,
}

/// Keeps the metrics recorder reachable for the process lifetime.
#[derive(Debug, Default)]
pub struct ObservabilityHandle {
    metrics: Option<PrometheusHandle>,
}

impl ObservabilityHandle {
    /// Renders the current metrics, if an exporter is installed.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(PrometheusHandle::render)
    }
}

/// Installs the log subscriber and, when requested, the metrics exporter.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed, the log file
/// cannot be opened, or the exporter cannot bind.
pub fn init(config: &EnrollaConfig, options: InitOptions) -> Result<ObservabilityHandle> {
    let rust_log = std::env::var("RUST_LOG").ok();
    logging::install(
        &config.logging,
        build_filter(rust_log.as_deref(), options.verbose),
    )?;
    let metrics = if options.metrics {
        install_prometheus(&config.metrics)?
    } else {
        None
    };
    Ok(ObservabilityHandle { metrics })
}
