//! Metrics collection for barrio-push.
//!
//! Process-wide counters for the notification pipeline. Every stage of an
//! invocation (routing, recipient resolution, sending, receipt lookup) bumps
//! the counter matching its outcome so that dropped notifications are
//! visible even though nothing is reported back to the event source.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Pipeline metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    // === Event Metrics ===
    /// Change events received from any ingress
    pub events_received: AtomicU64,
    /// Change events with no matching handler
    pub events_ignored: AtomicU64,
    /// Handler invocations that ended in an error
    pub events_failed: AtomicU64,
    /// Handler invocations abandoned at the invocation deadline
    pub events_timed_out: AtomicU64,

    // === Recipient Metrics ===
    /// Push messages built for eligible recipients
    pub messages_built: AtomicU64,
    /// Recipients dropped for a missing or malformed push token
    pub messages_skipped: AtomicU64,

    // === Gateway Metrics ===
    /// Chunks handed to the push gateway
    pub chunks_sent: AtomicU64,
    /// Chunks whose send call failed as a whole
    pub chunks_failed: AtomicU64,
    /// Tickets returned with status ok
    pub tickets_ok: AtomicU64,
    /// Tickets returned with status error
    pub tickets_error: AtomicU64,

    // === Receipt Metrics ===
    /// Receipts resolved as delivered
    pub receipts_ok: AtomicU64,
    /// Receipts resolved as failed
    pub receipts_error: AtomicU64,
    /// Accepted tickets left without a receipt
    pub receipts_missing: AtomicU64,
    /// Receipt lookup requests that failed as a whole
    pub receipt_lookup_failures: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_ignored: u64,
    pub events_failed: u64,
    pub events_timed_out: u64,
    pub messages_built: u64,
    pub messages_skipped: u64,
    pub chunks_sent: u64,
    pub chunks_failed: u64,
    pub tickets_ok: u64,
    pub tickets_error: u64,
    pub receipts_ok: u64,
    pub receipts_error: u64,
    pub receipts_missing: u64,
    pub receipt_lookup_failures: u64,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
            events_timed_out: AtomicU64::new(0),
            messages_built: AtomicU64::new(0),
            messages_skipped: AtomicU64::new(0),
            chunks_sent: AtomicU64::new(0),
            chunks_failed: AtomicU64::new(0),
            tickets_ok: AtomicU64::new(0),
            tickets_error: AtomicU64::new(0),
            receipts_ok: AtomicU64::new(0),
            receipts_error: AtomicU64::new(0),
            receipts_missing: AtomicU64::new(0),
            receipt_lookup_failures: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record the outcome of routing one change event.
    pub fn record_event(&self, handled: bool, failed: bool) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        if !handled {
            self.events_ignored.fetch_add(1, Ordering::Relaxed);
        }
        if failed {
            self.events_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            events_timed_out: self.events_timed_out.load(Ordering::Relaxed),
            messages_built: self.messages_built.load(Ordering::Relaxed),
            messages_skipped: self.messages_skipped.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            tickets_ok: self.tickets_ok.load(Ordering::Relaxed),
            tickets_error: self.tickets_error.load(Ordering::Relaxed),
            receipts_ok: self.receipts_ok.load(Ordering::Relaxed),
            receipts_error: self.receipts_error.load(Ordering::Relaxed),
            receipts_missing: self.receipts_missing.load(Ordering::Relaxed),
            receipt_lookup_failures: self.receipt_lookup_failures.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let counters = [
            ("events_received_total", "Change events received", s.events_received),
            ("events_ignored_total", "Change events without a handler", s.events_ignored),
            ("events_failed_total", "Change events whose handler failed", s.events_failed),
            ("events_timed_out_total", "Change events abandoned at the deadline", s.events_timed_out),
            ("messages_built_total", "Push messages built", s.messages_built),
            ("messages_skipped_total", "Recipients skipped for invalid tokens", s.messages_skipped),
            ("chunks_sent_total", "Chunks sent to the push gateway", s.chunks_sent),
            ("chunks_failed_total", "Chunks that failed to send", s.chunks_failed),
            ("tickets_ok_total", "Tickets accepted by the gateway", s.tickets_ok),
            ("tickets_error_total", "Tickets rejected by the gateway", s.tickets_error),
            ("receipts_ok_total", "Receipts resolved as delivered", s.receipts_ok),
            ("receipts_error_total", "Receipts resolved as failed", s.receipts_error),
            ("receipts_missing_total", "Accepted tickets without a receipt", s.receipts_missing),
            ("receipt_lookup_failures_total", "Receipt lookups that failed", s.receipt_lookup_failures),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP barrio_{name} {help}");
            let _ = writeln!(output, "# TYPE barrio_{name} counter");
            let _ = writeln!(output, "barrio_{name} {value}");
        }
        output
    }
}
