//! Prometheus metrics for the entitlement layer
//!
//! Metrics live in a crate-local registry; [`gather_metrics`] renders them in the
//! Prometheus text format for whatever exporter the host application runs.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Cache operations
pub mod cache {
    use super::{
        register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
        HistogramVec, REGISTRY,
    };
    use std::time::Duration;

    /// Cache lookups by outcome (fresh, stale, backoff, miss)
    pub static CACHE_LOOKUPS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "entitlement_cache_lookups_total",
            "Total number of entitlement cache lookups",
            &["cache", "outcome"],
            REGISTRY.clone()
        ).expect("Failed to register CACHE_LOOKUPS")
    });

    /// Completed fetches by result (success, failure, superseded)
    pub static CACHE_FETCHES: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "entitlement_cache_fetches_total",
            "Total number of entitlement document fetches",
            &["cache", "result"],
            REGISTRY.clone()
        ).expect("Failed to register CACHE_FETCHES")
    });

    /// Fetch latency
    pub static FETCH_DURATION: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
        register_histogram_vec_with_registry!(
            "entitlement_fetch_duration_seconds",
            "Entitlement document fetch duration in seconds",
            &["cache"],
            REGISTRY.clone()
        ).expect("Failed to register FETCH_DURATION")
    });

    pub fn record_lookup(cache: &str, outcome: &str) {
        CACHE_LOOKUPS.with_label_values(&[cache, outcome]).inc();
    }

    pub fn record_fetch(cache: &str, result: &str) {
        CACHE_FETCHES.with_label_values(&[cache, result]).inc();
    }

    pub fn observe_fetch_duration(cache: &str, elapsed: Duration) {
        FETCH_DURATION
            .with_label_values(&[cache])
            .observe(elapsed.as_secs_f64());
    }
}

/// Gate decisions
pub mod gates {
    use super::{register_counter_vec_with_registry, CounterVec, REGISTRY};

    /// Decisions by gate kind and outcome
    pub static GATE_DECISIONS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "entitlement_gate_decisions_total",
            "Total number of gate decisions",
            &["gate", "decision"],
            REGISTRY.clone()
        ).expect("Failed to register GATE_DECISIONS")
    });

    pub fn record(gate: &str, allowed: bool) {
        let decision = if allowed { "allow" } else { "deny" };
        GATE_DECISIONS.with_label_values(&[gate, decision]).inc();
    }
}

/// Render all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|_| prometheus::Error::Msg("Invalid UTF-8".to_string()))
}
