//! Prometheus metrics for the relay.
//!
//! Metrics live on a registry owned by [`ServiceMetrics`] rather than the
//! process-global default registry, so independent instances (one per test)
//! never collide on registration.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Route label used for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Service metrics collection
pub struct ServiceMetrics {
    registry: Registry,

    /// Inbound requests by route template and status code
    pub http_requests_total: IntCounterVec,

    /// Outbound n8n call latency by webhook route
    pub forward_duration_seconds: HistogramVec,

    /// Outbound n8n calls that failed, by webhook route
    pub forward_failures_total: IntCounterVec,

    /// DingTalk callbacks rejected by signature verification, by reason
    pub signature_rejections_total: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("n8n_relay".to_string()), None)?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Inbound HTTP requests"),
            &["route", "status"],
        )?;
        let forward_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "forward_duration_seconds",
                "Latency of outbound n8n webhook calls",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["route"],
        )?;
        let forward_failures_total = IntCounterVec::new(
            Opts::new("forward_failures_total", "Failed outbound n8n webhook calls"),
            &["route"],
        )?;
        let signature_rejections_total = IntCounterVec::new(
            Opts::new(
                "signature_rejections_total",
                "DingTalk callbacks rejected by signature verification",
            ),
            &["reason"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(forward_duration_seconds.clone()))?;
        registry.register(Box::new(forward_failures_total.clone()))?;
        registry.register(Box::new(signature_rejections_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            forward_duration_seconds,
            forward_failures_total,
            signature_rejections_total,
        })
    }

    pub fn record_http_request(&self, route: &str, status: u16) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[route, status.as_str()])
            .inc();
    }

    pub fn record_forward(&self, route: &str, duration: Duration, success: bool) {
        self.forward_duration_seconds
            .with_label_values(&[route])
            .observe(duration.as_secs_f64());
        if !success {
            self.forward_failures_total.with_label_values(&[route]).inc();
        }
    }

    pub fn record_signature_rejection(&self, reason: &str) {
        self.signature_rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
