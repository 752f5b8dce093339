//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the packer server:
//! - HTTP request metrics (latency, counts, errors)
//! - Authentication failures
//! - Pickings by state (collected on scrape)
//!
//! Packing metrics live in `packer_core::metrics` and are registered here too.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use packer_core::{PickingFilter, PickingState};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "packer_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("packer_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "packer_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("packer_auth_failures_total", "Total authentication failures"),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Picking Metrics (collected dynamically)
// =============================================================================

/// Pickings by current state.
pub static PICKINGS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("packer_pickings_by_state", "Current picking count by state"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Pickings
    registry
        .register(Box::new(PICKINGS_BY_STATE.clone()))
        .unwrap();

    // Core metrics (packing)
    for metric in packer_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Refresh gauges that mirror stored state. Called before encoding.
pub fn collect_dynamic_metrics(state: &AppState) {
    for picking_state in PickingState::ALL {
        let filter = PickingFilter::new().with_state(picking_state);
        if let Ok(count) = state.stock().count_pickings(&filter) {
            PICKINGS_BY_STATE
                .with_label_values(&[picking_state.as_str()])
                .set(count);
        }
    }
}

/// Normalize a path for metric labels (replace numeric IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static NUMERIC: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    // matches cannot overlap, so a second pass catches an id right after another
    let result = NUMERIC.replace_all(path, "/{id}$1");
    let result = NUMERIC.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/pickings/12345"), "/api/v1/pickings/{id}");
    }

    #[test]
    fn test_normalize_path_adjacent_ids() {
        assert_eq!(normalize_path("/api/v1/things/1/2"), "/api/v1/things/{id}/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(
            normalize_path("/api/v1/wizards/pack-products"),
            "/api/v1/wizards/pack-products"
        );
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("packer_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        PICKINGS_BY_STATE.with_label_values(&["draft"]).set(0);
        packer_core::metrics::PACKED_PICKINGS
            .with_label_values(&["success"])
            .inc_by(0);
        packer_core::metrics::LOTS_CREATED.inc_by(0);

        let output = encode_metrics();
        assert!(output.contains("packer_pickings_by_state"));
        assert!(output.contains("packer_packed_pickings_total"));
        assert!(output.contains("packer_lots_created_total"));
    }
}
