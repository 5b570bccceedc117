// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Prometheus metrics, served at `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    HistogramVec, IntCounterVec, IntGauge, IntGaugeVec,
};

use shorturl_core::{CacheStats, StoreError, StoreResult};

lazy_static! {
    pub static ref REQUESTS: IntCounterVec = register_int_counter_vec!(
        "shorturl_requests_total",
        "Store operations handled, by operation and outcome",
        &["op", "outcome"]
    )
    .unwrap();
    pub static ref REMOTE_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "shorturl_remote_call_duration_seconds",
        "Latency of calls from this proxy to the master",
        &["path"],
        vec![0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0, 5.0]
    )
    .unwrap();
    pub static ref LOCAL_KEYS: IntGauge = register_int_gauge!(
        "shorturl_local_keys",
        "Mappings held by this node (cached entries on a proxy)"
    )
    .unwrap();
    pub static ref CACHE: IntGaugeVec = register_int_gauge_vec!(
        "shorturl_cache_events",
        "Proxy cache hits, misses and failed remote calls since start",
        &["event"]
    )
    .unwrap();
}

/// Force registration so every series shows up on the first scrape.
pub fn init() {
    lazy_static::initialize(&REQUESTS);
    lazy_static::initialize(&REMOTE_CALL_DURATION);
    lazy_static::initialize(&LOCAL_KEYS);
    lazy_static::initialize(&CACHE);
}

/// Count one store operation.
pub fn observe<T>(op: &str, result: &StoreResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(StoreError::KeyNotFound { .. }) => "not_found",
        Err(StoreError::RemoteUnavailable { .. }) => "remote_unavailable",
        Err(_) => "error",
    };
    REQUESTS.with_label_values(&[op, outcome]).inc();
}

/// Refresh the gauges sampled from the store and encode all metrics.
pub fn render(local_keys: usize, cache: Option<CacheStats>) -> String {
    use prometheus::Encoder;

    LOCAL_KEYS.set(i64::try_from(local_keys).unwrap_or(i64::MAX));
    if let Some(stats) = cache {
        for (event, value) in [
            ("hit", stats.hits),
            ("miss", stats.misses),
            ("remote_failure", stats.remote_failures),
        ] {
            CACHE
                .with_label_values(&[event])
                .set(i64::try_from(value).unwrap_or(i64::MAX));
        }
    }

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("Encoding error"))
}
