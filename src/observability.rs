// ── Service metrics (request-driven) ─────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "peerbook_bookings_created_total";

/// Counter: approve/reject decisions applied. Labels: decision.
pub const BOOKING_DECISIONS_TOTAL: &str = "peerbook_booking_decisions_total";

// ── Store metrics (resource utilization) ─────────────────────────

/// Gauge: bookings held by the store.
pub const STORE_BOOKINGS: &str = "peerbook_store_bookings";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "peerbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "peerbook_wal_flush_batch_size";

/// Map a decision to its metric label.
pub fn decision_label(approved: bool) -> &'static str {
    if approved { "approved" } else { "rejected" }
}
