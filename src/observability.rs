use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing_subscriber::EnvFilter;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "hallbook_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "hallbook_query_duration_seconds";

// ── Booking outcomes ────────────────────────────────────────────

/// Counter: bookings accepted as Pending.
pub const BOOKINGS_SUBMITTED_TOTAL: &str = "hallbook_bookings_submitted_total";

/// Counter: submissions refused because the hall was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "hallbook_booking_conflicts_total";

/// Counter: decision attempts. Labels: decision, outcome.
pub const BOOKING_DECISIONS_TOTAL: &str = "hallbook_booking_decisions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "hallbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "hallbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "hallbook_connections_rejected_total";

/// Counter: logins for unknown users.
pub const AUTH_FAILURES_TOTAL: &str = "hallbook_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "hallbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "hallbook_wal_flush_batch_size";

/// Counter: WAL compactions run by the background compactor. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "hallbook_wal_compactions_total";

/// Install the global fmt subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SubmitBooking { .. } => "submit_booking",
        Command::DecideBooking { .. } => "decide_booking",
        Command::SelectBookings { id: Some(_), .. } => "get_booking",
        Command::SelectBookings { id: None, .. } => "list_bookings",
        Command::SelectSchedule { .. } => "select_schedule",
        Command::SelectConflicts { .. } => "select_conflicts",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectSlots { .. } => "select_slots",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parse_sql;

    #[test]
    fn labels_distinguish_get_from_list() {
        let get = parse_sql("SELECT * FROM bookings WHERE id = '01ARZ3NDEKTSV4RRFFQ69G5FAV'").unwrap();
        let list = parse_sql("SELECT * FROM bookings WHERE hall = 'Auditorium'").unwrap();
        assert_eq!(command_label(&get), "get_booking");
        assert_eq!(command_label(&list), "list_bookings");
    }

    #[test]
    fn metrics_disabled_without_port() {
        assert!(init_metrics(None).is_ok());
    }
}
