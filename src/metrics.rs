// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

// NOTE: When the observability feature is disabled, same-named no-op macros
// keep every call site compiling with zero overhead.
#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
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
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_histogram, histogram};

/// Registers descriptions for all metrics. Call once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "backfill_jobs_processed_total",
        "Backfill jobs consumed from the queue, labeled by terminal status."
    );
    describe_counter!(
        "backfill_days_saved_total",
        "Price records newly persisted across all jobs."
    );
    describe_counter!(
        "backfill_provider_errors_total",
        "Upstream provider failures, labeled by call kind."
    );
    describe_histogram!(
        "backfill_job_duration_seconds",
        "Wall-clock duration of one backfill job."
    );
}

pub fn increment_jobs_processed(status: &'static str) {
    counter!("backfill_jobs_processed_total", 1, "status" => status);
}

pub fn increment_days_saved(days: u32) {
    counter!("backfill_days_saved_total", days as u64);
}

pub fn increment_provider_error(kind: &'static str) {
    counter!("backfill_provider_errors_total", 1, "kind" => kind);
}

pub fn record_job_duration(duration: std::time::Duration) {
    histogram!("backfill_job_duration_seconds", duration.as_secs_f64());
}

/// Installs the Prometheus exporter on the given port.
#[cfg(feature = "observability")]
pub fn install_prometheus_exporter(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::{Ipv4Addr, SocketAddr};

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
    log::info!("📊 Prometheus exporter listening on {}", addr);
    Ok(())
}
