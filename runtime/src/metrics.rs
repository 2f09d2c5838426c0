//! Prometheus metrics for observability and monitoring.
//!
//! Covers the initialization pipeline, theme fallbacks, module init failures
//! and request routing.
//!
//! # Example
//!
//! ```rust,no_run
//! use trellis_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Exposition text for a /metrics endpoint
//! let body = server.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics recorder and renderer.
///
/// The binary serves [`MetricsServer::render`] on its own listener.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the exposition endpoint should listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "trellis_init_cycles_total",
        "Initialization cycles by outcome (ok, fatal)"
    );
    describe_histogram!(
        "trellis_init_duration_seconds",
        "Time taken by an initialization cycle"
    );
    describe_counter!(
        "trellis_module_init_failures_total",
        "Module init hooks that failed, by module"
    );
    describe_counter!(
        "trellis_theme_fallbacks_total",
        "Theme activations that fell back to the default theme"
    );
    describe_counter!(
        "trellis_requests_routed_total",
        "Dispatched requests by whether any module matched"
    );
}

/// Initialization pipeline metrics recorder.
pub struct InitMetrics;

impl InitMetrics {
    /// Record a completed cycle.
    pub fn record_success(duration: Duration) {
        counter!("trellis_init_cycles_total", "outcome" => "ok").increment(1);
        histogram!("trellis_init_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a cycle that failed fatally.
    pub fn record_fatal() {
        counter!("trellis_init_cycles_total", "outcome" => "fatal").increment(1);
    }
}

/// Module lifecycle metrics recorder.
pub struct ModuleMetrics;

impl ModuleMetrics {
    /// Record a failed init hook.
    pub fn record_init_failure(module: &str) {
        counter!("trellis_module_init_failures_total", "module" => module.to_string()).increment(1);
    }
}

/// Theme metrics recorder.
pub struct ThemeMetrics;

impl ThemeMetrics {
    /// Record a fallback to the default theme.
    pub fn record_fallback() {
        counter!("trellis_theme_fallbacks_total").increment(1);
    }
}

/// Request routing metrics recorder.
pub struct RoutingMetrics;

impl RoutingMetrics {
    /// Record a dispatched request.
    pub fn record_request(matched: bool) {
        let matched = if matched { "true" } else { "false" };
        counter!("trellis_requests_routed_total", "matched" => matched).increment(1);
    }
}
