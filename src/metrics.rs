use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Requests sent to the recording service, by endpoint and outcome
    pub static ref REMOTE_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "dvbviewer_remote_requests_total",
        "Requests sent to the DVBViewer recording service",
        &["endpoint", "outcome"]
    )
    .unwrap();

    /// Cache refresh attempts, by cache and outcome (fresh, stale, failed)
    pub static ref CACHE_REFRESHES: IntCounterVec = register_int_counter_vec!(
        "dvbviewer_cache_refresh_total",
        "Cache refresh attempts",
        &["cache", "outcome"]
    )
    .unwrap();
}

pub fn record_request(endpoint: &str, outcome: &str) {
    REMOTE_REQUESTS.with_label_values(&[endpoint, outcome]).inc();
}

pub fn record_refresh(cache: &str, outcome: &str) {
    CACHE_REFRESHES.with_label_values(&[cache, outcome]).inc();
}
