//! Prometheus metrics exporter.

use crate::{Error, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Metrics exporter configuration.
#[derive(Debug, Clone, Copy)]
pub struct MetricsConfig {
    /// Whether to install the exporter at all.
    pub enabled: bool,
    /// Port for the HTTP scrape listener.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Installs the global Prometheus recorder with an HTTP scrape listener.
///
/// Counters and histograms recorded through the `metrics` macros
/// (`memory_store_retries_total`, `memory_dedup_check_duration_ms`, ...)
/// become visible on `/metrics`. A no-op when disabled.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] when a recorder is already installed
/// or the listener cannot bind.
pub fn install_metrics(config: MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| Error::operation("metrics_install", e))?;

    tracing::info!(port = config.port, "Prometheus metrics listener installed");
    Ok(())
}
