//! Prometheus metrics exporter.

use crate::config::MetricsConfig;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;

/// Installs the Prometheus recorder and its HTTP listener.
///
/// Returns `None` when metrics are disabled. Outside a tokio runtime the
/// listener gets a dedicated thread with its own runtime.
pub fn install_prometheus(config: &MetricsConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }
    let listen_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port);
    let builder = PrometheusBuilder::new().with_http_listener(listen_addr);

    let handle = if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        install_with_runtime(builder, &runtime)?
    } else {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| exporter_error("metrics_runtime_init", &e))?;
        let handle = install_with_runtime(builder, runtime.handle())?;
        thread::Builder::new()
            .name("metrics-exporter".to_string())
            .spawn(move || runtime.block_on(std::future::pending::<()>()))
            .map_err(|e| exporter_error("metrics_runtime_thread", &e))?;
        handle
    };
    tracing::info!(%listen_addr, "Prometheus exporter listening");
    Ok(Some(handle))
}

fn install_with_runtime(
    builder: PrometheusBuilder,
    runtime: &tokio::runtime::Handle,
) -> Result<PrometheusHandle> {
    let (recorder, exporter) = {
        let _guard = runtime.enter();
        builder
            .build()
            .map_err(|e| exporter_error("metrics_exporter_build", &e))?
    };
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| exporter_error("metrics_recorder_install", &e))?;
    runtime.spawn(exporter);
    Ok(handle)
}

fn exporter_error(operation: &str, cause: &dyn std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}
