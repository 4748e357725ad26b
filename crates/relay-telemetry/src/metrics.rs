//! Prometheus metrics for the oracle relay.
//!
//! All metrics follow the naming convention: `relay_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., oracles_registered_total)
//! - **Gauge**: Value that can go up or down (e.g., submissions_in_flight)
//! - **Histogram**: Distribution of values (e.g., submission_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BOOTSTRAP METRICS
    // =========================================================================

    /// Oracles registered with the registry by this process
    pub static ref ORACLES_REGISTERED: Counter = Counter::new(
        "relay_bootstrap_oracles_registered_total",
        "Total oracle registrations completed by this relay"
    ).expect("metric creation failed");

    /// Oracles that failed registration or index retrieval
    pub static ref REGISTRATION_FAILURES: Counter = Counter::new(
        "relay_bootstrap_registration_failures_total",
        "Total oracle identities excluded from the pool during bootstrap"
    ).expect("metric creation failed");

    /// Current size of the registered oracle pool
    pub static ref ORACLE_POOL_SIZE: Gauge = Gauge::new(
        "relay_bootstrap_oracle_pool_size",
        "Number of oracles available for request matching"
    ).expect("metric creation failed");

    // =========================================================================
    // EVENT RELAY METRICS
    // =========================================================================

    /// Events received from the registry subscription
    pub static ref EVENTS_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("relay_events_received_total", "Registry events received by the relay"),
        &["kind"]  // kind: oracle_request/flight_status_info/other
    ).expect("metric creation failed");

    /// Requests ignored because the relay is halted for them
    pub static ref REQUESTS_SUPPRESSED: Counter = Counter::new(
        "relay_requests_suppressed_total",
        "Oracle requests skipped after a terminal status event"
    ).expect("metric creation failed");

    /// Oracles matched across all requests
    pub static ref ORACLES_MATCHED: Counter = Counter::new(
        "relay_oracles_matched_total",
        "Total oracle/request matches"
    ).expect("metric creation failed");

    // =========================================================================
    // SUBMISSION METRICS
    // =========================================================================

    /// Response submissions by outcome
    pub static ref RESPONSES_SUBMITTED: CounterVec = CounterVec::new(
        Opts::new("relay_responses_submitted_total", "Oracle response submissions"),
        &["outcome"]  // outcome: accepted/rejected/unknown
    ).expect("metric creation failed");

    /// Submissions currently in flight
    pub static ref SUBMISSIONS_IN_FLIGHT: Gauge = Gauge::new(
        "relay_submissions_in_flight",
        "Oracle response submissions awaiting the registry"
    ).expect("metric creation failed");

    /// Submission round-trip duration
    pub static ref SUBMISSION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "relay_submission_duration_seconds",
            "Time spent waiting for the registry to answer a response submission"
        ).buckets(exponential_buckets(0.001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Calling this twice returns an error from the second registration.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Bootstrap
        Box::new(ORACLES_REGISTERED.clone()),
        Box::new(REGISTRATION_FAILURES.clone()),
        Box::new(ORACLE_POOL_SIZE.clone()),
        // Relay
        Box::new(EVENTS_RECEIVED.clone()),
        Box::new(REQUESTS_SUPPRESSED.clone()),
        Box::new(ORACLES_MATCHED.clone()),
        // Submissions
        Box::new(RESPONSES_SUBMITTED.clone()),
        Box::new(SUBMISSIONS_IN_FLIGHT.clone()),
        Box::new(SUBMISSION_DURATION.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::HistogramTimer::new(&$histogram)
    };
}
