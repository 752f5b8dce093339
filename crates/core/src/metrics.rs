//! Prometheus metrics for the packing workflow.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Packing
// =============================================================================

/// Packed picking requests by result.
pub static PACKED_PICKINGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "packer_packed_pickings_total",
            "Total packed picking requests",
        ),
        &["result"], // "success", "rejected", "failed"
    )
    .unwrap()
});

/// Time spent creating and packing a picking, commit included.
pub static PACK_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "packer_pack_duration_seconds",
            "Duration of packed picking creation",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
    )
    .unwrap()
});

/// Lines per packed picking request.
pub static PACK_LINES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("packer_pack_lines", "Number of lines per packed picking")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap()
});

/// Lots created while packing.
pub static LOTS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("packer_lots_created_total", "Total lots created").unwrap()
});

/// Packages created while packing.
pub static PACKAGES_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("packer_packages_created_total", "Total packages created").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PACKED_PICKINGS.clone()),
        Box::new(PACK_DURATION.clone()),
        Box::new(PACK_LINES.clone()),
        Box::new(LOTS_CREATED.clone()),
        Box::new(PACKAGES_CREATED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        PACKED_PICKINGS.with_label_values(&["success"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"packer_packed_pickings_total".to_string()));
    }
}
