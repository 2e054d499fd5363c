use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── Layout ──────────────────────────────────────────────────────

/// Counter: day layouts computed.
pub const LAYOUT_DAYS_TOTAL: &str = "consultcal_layout_days_total";

/// Histogram: time to lay out one day, in seconds.
pub const LAYOUT_DURATION_SECONDS: &str = "consultcal_layout_duration_seconds";

// ── Store ───────────────────────────────────────────────────────

/// Counter: store mutations. Labels: op, status.
pub const MUTATIONS_TOTAL: &str = "consultcal_mutations_total";

/// Counter: draft bookings confirmed by the background job.
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "consultcal_bookings_confirmed_total";

/// Gauge: draft bookings waiting for confirmation.
pub const BOOKINGS_PENDING: &str = "consultcal_bookings_pending";

/// Gauge: user calendars held in memory.
pub const CALENDARS_LOADED: &str = "consultcal_calendars_loaded";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "consultcal_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "consultcal_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "consultcal_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Status label for a fallible operation.
pub fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "ok" } else { "error" }
}
