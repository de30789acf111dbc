use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "slotbook_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "slotbook_query_duration_seconds";

/// Counter: slot lookups. Labels: outcome (some, none, error).
pub const SLOT_QUERIES_TOTAL: &str = "slotbook_slot_queries_total";

/// Counter: appointment requests accepted.
pub const REQUESTS_SUBMITTED_TOTAL: &str = "slotbook_requests_submitted_total";

/// Counter: appointment requests refused. Labels: reason.
pub const REQUESTS_REJECTED_TOTAL: &str = "slotbook_requests_rejected_total";

/// Counter: owner notifications. Labels: status (ok, error).
pub const NOTIFY_DELIVERIES_TOTAL: &str = "slotbook_notify_deliveries_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "slotbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "slotbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "slotbook_connections_rejected_total";

/// Histogram: request log group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: request log group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus metrics exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SelectServices => "select_services",
        Command::SelectHours { .. } => "select_hours",
        Command::SelectSlots { .. } => "select_slots",
        Command::SelectRequests { .. } => "select_requests",
        Command::InsertRequest { .. } => "insert_request",
    }
}
