//! Prometheus metrics for subscriber-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

/// Database query duration histogram, labeled by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "subscriber_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Bills generated by the monthly cycle.
pub static BILLS_GENERATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "subscriber_bills_generated_total",
        "Total monthly bills generated"
    )
    .expect("Failed to register BILLS_GENERATED_TOTAL")
});

/// Customers suspended by the overdue sweep.
pub static SUSPENSIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "subscriber_suspensions_total",
        "Total customers suspended for overdue bills"
    )
    .expect("Failed to register SUSPENSIONS_TOTAL")
});

/// Router command delivery outcomes, labeled by result.
pub static ROUTER_COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "subscriber_router_commands_total",
        "Router command delivery attempts by result",
        &["result"]
    )
    .expect("Failed to register ROUTER_COMMANDS_TOTAL")
});

/// Errors by category.
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "subscriber_errors_total",
        "Total errors by type",
        &["error_type"]
    )
    .expect("Failed to register ERRORS_TOTAL")
});

/// Force metric registration at startup so scrape output is complete
/// before the first request.
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&BILLS_GENERATED_TOTAL);
    Lazy::force(&SUSPENSIONS_TOTAL);
    Lazy::force(&ROUTER_COMMANDS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    service_core::middleware::metrics::init_http_metrics();
}

/// Render all registered metrics in Prometheus text format.
pub fn get_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_render_after_init() {
        init_metrics();
        BILLS_GENERATED_TOTAL.inc();
        let output = get_metrics();
        assert!(output.contains("subscriber_bills_generated_total"));
    }
}
