// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Quote latency is sampled; the router can issue thousands of quotes per request
static QUOTE_LATENCY_SAMPLE_COUNTER: AtomicU64 = AtomicU64::new(0);
const QUOTE_LATENCY_SAMPLE_EVERY: u64 = 16;

/// Registers descriptions for every metric the SDK emits. Call once at startup.
pub fn describe_metrics() {
    describe_histogram!(
        "bunni_quote_latency_us",
        Unit::Microseconds,
        "Latency of a single pool quote (sampled)."
    );
    describe_counter!(
        "bunni_quote_failures_total",
        Unit::Count,
        "Failed quotes, labeled by error kind."
    );
    describe_counter!("bunni_surge_total", Unit::Count, "Quotes that triggered a surge.");
    describe_counter!(
        "bunni_rebalance_trigger_total",
        Unit::Count,
        "Quotes that flagged a rebalance order."
    );
    describe_counter!("bunni_cache_hits_total", Unit::Count, "Snapshot cache hits.");
    describe_counter!("bunni_cache_misses_total", Unit::Count, "Snapshot cache misses.");
    describe_gauge!("bunni_cache_size", "Pools held in the snapshot cache.");
}

/// Installs the Prometheus recorder and a `tracing` subscriber at the configured level.
///
/// The returned handle renders the scrape payload; serving it is left to the embedding process.
#[cfg(feature = "observability")]
pub fn init_observability(
    logging: &crate::settings::Logging,
) -> anyhow::Result<metrics_exporter_prometheus::PrometheusHandle> {
    use anyhow::Context;

    let level: tracing::Level = logging
        .level
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid log level {:?}", logging.level))?;
    let builder = tracing_subscriber::fmt().with_max_level(level);
    let installed = if logging.json { builder.json().try_init() } else { builder.try_init() };
    installed.map_err(|e| anyhow::anyhow!("installing tracing subscriber: {}", e))?;

    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("installing prometheus recorder")?;
    describe_metrics();
    Ok(handle)
}

// --- Helper functions to update metrics ---

pub fn record_quote_latency_us(elapsed: Duration) {
    if QUOTE_LATENCY_SAMPLE_COUNTER.fetch_add(1, Ordering::Relaxed) % QUOTE_LATENCY_SAMPLE_EVERY != 0 {
        return;
    }
    histogram!("bunni_quote_latency_us", elapsed.as_micros() as f64);
}

pub fn increment_quote_failure(kind: &'static str) {
    counter!("bunni_quote_failures_total", 1, "kind" => kind);
}

pub fn increment_surge() {
    counter!("bunni_surge_total", 1);
}

pub fn increment_rebalance_trigger() {
    counter!("bunni_rebalance_trigger_total", 1);
}

pub fn increment_cache_hit() {
    counter!("bunni_cache_hits_total", 1);
}

pub fn increment_cache_miss() {
    counter!("bunni_cache_misses_total", 1);
}

pub fn set_cache_size(size: f64) {
    gauge!("bunni_cache_size", size);
}
