//! Prometheus metrics for the gatekeeper gateway
//!
//! Provides centralized metrics collection for monitoring:
//! - Rate limit decisions (allowed / denied / limiter error)
//! - Pipeline rejections by reason
//! - Downstream proxy outcomes and latency

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounterVec, TextEncoder, opts, register_histogram,
    register_int_counter_vec,
};

// ============================================================================
// Admission Metrics
// ============================================================================

/// Rate limit decisions by outcome ("allowed", "denied", "error")
pub static RATE_LIMIT_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "gatekeeper_rate_limit_decisions_total",
            "Token bucket decisions by outcome"
        ),
        &["outcome"]
    )
    .expect("Failed to register RATE_LIMIT_DECISIONS_TOTAL metric")
});

/// Requests terminated by a pipeline stage, by reason
pub static PIPELINE_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "gatekeeper_pipeline_rejections_total",
            "Requests rejected by the admission pipeline"
        ),
        &["reason"]
    )
    .expect("Failed to register PIPELINE_REJECTIONS_TOTAL metric")
});

// ============================================================================
// Proxy Metrics
// ============================================================================

/// Downstream responses relayed by the proxy (by status code)
pub static PROXY_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "gatekeeper_proxy_requests_total",
            "Requests forwarded to the downstream service"
        ),
        &["status_code"]
    )
    .expect("Failed to register PROXY_REQUESTS_TOTAL metric")
});

/// Downstream round-trip duration in seconds
pub static PROXY_REQUEST_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "gatekeeper_proxy_request_duration_seconds",
        "Downstream round-trip duration in seconds"
    )
    .expect("Failed to register PROXY_REQUEST_DURATION_SECONDS metric")
});

// ============================================================================
// Metrics Collection
// ============================================================================

/// Gather all registered metrics and encode as Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics() {
        RATE_LIMIT_DECISIONS_TOTAL
            .with_label_values(&["allowed"])
            .inc();

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("gatekeeper_rate_limit_decisions_total"));
    }
}
