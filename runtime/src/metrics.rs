//! Prometheus metrics for the pipeline.
//!
//! # Example
//!
//! ```rust,no_run
//! use courier_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(body) = server.render() {
//!     println!("{body}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder with a rendering handle.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server for `addr` (the address scrapers are told about).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe the pipeline metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. An already
    /// installed recorder is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "courier_requests_total",
        "Total number of requests that produced a response"
    );
    describe_counter!(
        "courier_request_errors_total",
        "Total number of requests that ended in a transport error"
    );
    describe_counter!(
        "courier_cache_hits_total",
        "Total number of responses served from the cache"
    );
    describe_histogram!(
        "courier_request_duration_seconds",
        "Time between a request being created and its response"
    );
    describe_counter!(
        "courier_retries_total",
        "Total number of retries performed by the pipeline"
    );
}

/// Request metrics recorder.
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record a response.
    pub fn record_response(method: &'static str, status: u16, elapsed: Option<Duration>) {
        counter!(
            "courier_requests_total",
            "method" => method,
            "status" => status.to_string()
        )
        .increment(1);
        if let Some(elapsed) = elapsed {
            histogram!("courier_request_duration_seconds", "method" => method)
                .record(elapsed.as_secs_f64());
        }
    }

    /// Record a transport error.
    pub fn record_error(method: &'static str) {
        counter!("courier_request_errors_total", "method" => method).increment(1);
    }

    /// Record a cache hit.
    pub fn record_cache_hit() {
        counter!("courier_cache_hits_total").increment(1);
    }

    /// Record a retry.
    pub fn record_retry() {
        counter!("courier_retries_total").increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        RequestMetrics::record_response("GET", 200, Some(Duration::from_millis(20)));
        RequestMetrics::record_error("POST");
        RequestMetrics::record_cache_hit();

        // handle is None when another test installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("courier_requests_total"));
            assert!(rendered.contains("courier_request_errors_total"));
            assert!(rendered.contains("courier_cache_hits_total"));
        }
    }
}
