use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

// Prometheus metrics (default registry)
pub static STORE_WRITES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "keystore_writes_total",
        "Write-through operations against the key store table",
        &["operation", "result"]
    )
    .expect("register keystore_writes_total")
});

pub static STORE_LOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "keystore_loads_total",
        "Full table scans into the key store cache",
        &["result"]
    )
    .expect("register keystore_loads_total")
});

pub static CACHED_SERVICES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "keystore_cached_services",
        "Number of services currently held in the key store cache"
    )
    .expect("register keystore_cached_services")
});

pub static AUTH_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "api_key_auth_total",
        "API key authentication attempts by outcome",
        &["outcome"]
    )
    .expect("register api_key_auth_total")
});

pub fn record_write(operation: &str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    STORE_WRITES_TOTAL.with_label_values(&[operation, result]).inc();
}

pub fn record_load(result: &str, cached: usize) {
    STORE_LOADS_TOTAL.with_label_values(&[result]).inc();
    record_cached(cached);
}

pub fn record_cached(cached: usize) {
    CACHED_SERVICES.set(i64::try_from(cached).unwrap_or(i64::MAX));
}

pub fn record_auth(outcome: &str) {
    AUTH_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
