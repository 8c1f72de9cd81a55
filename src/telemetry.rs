//! Prometheus metrics exposition.
//!
//! Listed in scope as an external collaborator with "no hard design" — this
//! is the thin ambient plumbing that contract implies: a handful of gauges
//! and counters, registered once at startup and rendered on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    pub static ref CONNECTIONS_TOTAL: IntCounter = IntCounter::new(
        "superchatd_connections_total",
        "Connections accepted across all transports"
    )
    .unwrap();
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "superchatd_sessions_active",
        "Currently connected sessions"
    )
    .unwrap();
    pub static ref MESSAGES_POSTED_TOTAL: IntCounter = IntCounter::new(
        "superchatd_messages_posted_total",
        "POST_MESSAGE requests accepted"
    )
    .unwrap();
    pub static ref ERRORS_SENT_TOTAL: IntCounter = IntCounter::new(
        "superchatd_errors_sent_total",
        "ERROR frames sent to clients"
    )
    .unwrap();
    pub static ref DIRECTORY_SERVERS: IntGauge = IntGauge::new(
        "superchatd_directory_servers",
        "Servers currently known to this directory"
    )
    .unwrap();
}

/// Registers every metric. Idempotent is not required — called exactly once
/// from `main` before any subsystem starts.
pub fn register() {
    REGISTRY
        .register(Box::new(CONNECTIONS_TOTAL.clone()))
        .expect("register connections_total");
    REGISTRY
        .register(Box::new(SESSIONS_ACTIVE.clone()))
        .expect("register sessions_active");
    REGISTRY
        .register(Box::new(MESSAGES_POSTED_TOTAL.clone()))
        .expect("register messages_posted_total");
    REGISTRY
        .register(Box::new(ERRORS_SENT_TOTAL.clone()))
        .expect("register errors_sent_total");
    REGISTRY
        .register(Box::new(DIRECTORY_SERVERS.clone()))
        .expect("register directory_servers");
}

/// Renders the registry in Prometheus text exposition format.
pub fn render() -> String {
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buf)
        .expect("encoding metrics to the text format cannot fail");
    String::from_utf8(buf).expect("prometheus text output is valid utf-8")
}
