//! Metrics collection.
//!
//! Prometheus-compatible metrics for provisioning runs. The recorder is
//! optional: without `--metrics-port` nothing is installed and the macro
//! calls are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::RangeforgeError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`; otherwise the recorder is installed without an
/// endpoint so metrics can still be read programmatically.
///
/// # Errors
///
/// Returns an I/O error when the recorder or listener cannot be installed
/// (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), RangeforgeError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }

    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| RangeforgeError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "rangeforge_operations_total",
        "Provisioning operations executed, by type and outcome"
    );
    describe_counter!(
        "rangeforge_operations_skipped_total",
        "Idempotent no-ops, by type"
    );
    describe_counter!(
        "rangeforge_health_timeouts_total",
        "Containers that failed to become healthy in time"
    );
    describe_histogram!(
        "rangeforge_health_wait_ms",
        "Time spent waiting for container health"
    );
    describe_histogram!(
        "rangeforge_wave_duration_ms",
        "Wall-clock duration of each parallel wave"
    );
}

/// Records one executed operation.
pub fn record_operation(op_type: &'static str, success: bool) {
    counter!(
        "rangeforge_operations_total",
        "type" => op_type,
        "outcome" => if success { "ok" } else { "failed" }
    )
    .increment(1);
}

/// Records one idempotent skip.
pub fn record_skip(op_type: &'static str) {
    counter!("rangeforge_operations_skipped_total", "type" => op_type).increment(1);
}

/// Records a finished health wait.
#[allow(clippy::cast_precision_loss)]
pub fn record_health_wait(waited: Duration, healthy: bool) {
    histogram!("rangeforge_health_wait_ms").record(waited.as_millis() as f64);
    if !healthy {
        counter!("rangeforge_health_timeouts_total").increment(1);
    }
}

/// Records a finished parallel wave.
#[allow(clippy::cast_precision_loss)]
pub fn record_wave(duration: Duration, wave_size: usize) {
    histogram!("rangeforge_wave_duration_ms", "size" => wave_size.to_string())
        .record(duration.as_millis() as f64);
}
