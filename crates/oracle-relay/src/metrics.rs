//! Relay counters
//!
//! In-process counters for bootstrap, event handling and submissions.
//! Every record call is mirrored into the Prometheus collectors of
//! `relay-telemetry`; the atomics here back [`RelayMetrics::snapshot`],
//! which tests and the shutdown summary read.

use std::sync::atomic::{AtomicU64, Ordering};

use relay_telemetry::{
    metric_inc, EVENTS_RECEIVED, ORACLES_MATCHED, ORACLES_REGISTERED, ORACLE_POOL_SIZE,
    REGISTRATION_FAILURES, REQUESTS_SUPPRESSED, RESPONSES_SUBMITTED, SUBMISSIONS_IN_FLIGHT,
};

use crate::domain::AttemptOutcome;
use crate::events::EventKind;

/// Thread-safe relay counters.
#[derive(Default, Debug)]
pub struct RelayMetrics {
    pub oracles_registered: AtomicU64,
    pub registration_failures: AtomicU64,
    pub pool_size: AtomicU64,
    pub requests_received: AtomicU64,
    pub terminal_events: AtomicU64,
    pub other_events: AtomicU64,
    pub requests_suppressed: AtomicU64,
    pub oracles_matched: AtomicU64,
    pub responses_accepted: AtomicU64,
    pub responses_rejected: AtomicU64,
    pub responses_unknown: AtomicU64,
    pub in_flight: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registration(&self) {
        self.oracles_registered.fetch_add(1, Ordering::Relaxed);
        metric_inc!(ORACLES_REGISTERED);
    }

    pub fn record_registration_failure(&self) {
        self.registration_failures.fetch_add(1, Ordering::Relaxed);
        metric_inc!(REGISTRATION_FAILURES);
    }

    pub fn record_pool_size(&self, size: usize) {
        self.pool_size.store(size as u64, Ordering::Relaxed);
        ORACLE_POOL_SIZE.set(size as f64);
    }

    pub fn record_event(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::OracleRequest => &self.requests_received,
            EventKind::TerminalStatus => &self.terminal_events,
            EventKind::Other => &self.other_events,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metric_inc!(EVENTS_RECEIVED, &[kind.label()]);
    }

    pub fn record_suppressed(&self) {
        self.requests_suppressed.fetch_add(1, Ordering::Relaxed);
        metric_inc!(REQUESTS_SUPPRESSED);
    }

    pub fn record_matches(&self, count: usize) {
        self.oracles_matched.fetch_add(count as u64, Ordering::Relaxed);
        ORACLES_MATCHED.inc_by(count as f64);
    }

    pub fn submission_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        SUBMISSIONS_IN_FLIGHT.inc();
    }

    pub fn submission_finished(&self, outcome: &AttemptOutcome) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        SUBMISSIONS_IN_FLIGHT.dec();

        let counter = match outcome {
            AttemptOutcome::Accepted => &self.responses_accepted,
            AttemptOutcome::Rejected { .. } => &self.responses_rejected,
            AttemptOutcome::Unknown { .. } => &self.responses_unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metric_inc!(RESPONSES_SUBMITTED, &[outcome.label()]);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            oracles_registered: self.oracles_registered.load(Ordering::Relaxed),
            registration_failures: self.registration_failures.load(Ordering::Relaxed),
            pool_size: self.pool_size.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            terminal_events: self.terminal_events.load(Ordering::Relaxed),
            other_events: self.other_events.load(Ordering::Relaxed),
            requests_suppressed: self.requests_suppressed.load(Ordering::Relaxed),
            oracles_matched: self.oracles_matched.load(Ordering::Relaxed),
            responses_accepted: self.responses_accepted.load(Ordering::Relaxed),
            responses_rejected: self.responses_rejected.load(Ordering::Relaxed),
            responses_unknown: self.responses_unknown.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RelayMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub oracles_registered: u64,
    pub registration_failures: u64,
    pub pool_size: u64,
    pub requests_received: u64,
    pub terminal_events: u64,
    pub other_events: u64,
    pub requests_suppressed: u64,
    pub oracles_matched: u64,
    pub responses_accepted: u64,
    pub responses_rejected: u64,
    pub responses_unknown: u64,
    pub in_flight: u64,
}

impl MetricsSnapshot {
    pub fn responses_total(&self) -> u64 {
        self.responses_accepted + self.responses_rejected + self.responses_unknown
    }
}
