//! Prometheus metrics for Switchyard services.
//!
//! - [`MetricsConfig`] and [`init_metrics`] install the global recorder.
//! - [`metrics_handler`] renders the exposition text for `/metrics`.
//! - [`record_pipeline_outcome`] and friends count pipeline failures per route.
//!
//! HTTP-level counters and histograms are recorded by
//! [`MetricsLayer`](crate::middleware::MetricsLayer).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use switchyard_lib::{PipelineResponse, HANDLER_ERROR};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Configuration for the metrics system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Path of the exposition endpoint.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// - `METRICS_ENABLED`: anything but `false` enables metrics (default: enabled)
    /// - `METRICS_PATH`: endpoint path (default: `/metrics`)
    pub fn from_env() -> Self {
        let enabled = std::env::var("METRICS_ENABLED")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let path = std::env::var("METRICS_PATH").unwrap_or_else(|_| "/metrics".to_string());

        Self { enabled, path }
    }

    /// Endpoint path, or `None` when metrics are disabled.
    pub fn endpoint(&self) -> Option<&str> {
        self.enabled.then_some(self.path.as_str())
    }
}

/// Errors raised while installing the metrics recorder.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricsError {
    #[error("metrics are disabled")]
    Disabled,
    #[error("metrics recorder already initialized")]
    AlreadyInitialized,
    #[error("failed to install metrics recorder: {0}")]
    InstallFailed(String),
}

/// Install the Prometheus recorder. Only the first call can succeed.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if PROMETHEUS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// The installed recorder's handle, if any.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Axum handler for the metrics endpoint.
pub async fn metrics_handler() -> String {
    prometheus_handle()
        .map(PrometheusHandle::render)
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

/// Count a request rejected before or after its handler ran.
///
/// `stage` is one of `input`, `output`, `body`, or `query`.
pub fn record_validation_failure(stage: &'static str, route: &str) {
    metrics::counter!(
        "switchyard_validation_failures_total",
        "stage" => stage,
        "route" => route.to_string()
    )
    .increment(1);
}

/// Count a handler that failed (`error`), panicked (`panic`), or timed out
/// (`timeout`).
pub fn record_handler_failure(reason: &'static str, route: &str) {
    metrics::counter!(
        "switchyard_handler_failures_total",
        "reason" => reason,
        "route" => route.to_string()
    )
    .increment(1);
}

/// Record the failure counters matching a pipeline response, if it failed.
pub fn record_pipeline_outcome(response: &PipelineResponse, route: &str) {
    let (Some(failure), Some(reason)) = (response.failure, response.reason) else {
        return;
    };

    if failure == HANDLER_ERROR {
        record_handler_failure(reason, route);
    } else {
        record_validation_failure(reason, route);
    }
}
