//! # Relay Telemetry
//!
//! Observability for the oracle relay.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber with env-filter, pretty or JSON output
//! - **Metrics**: Prometheus collectors for bootstrap, relay and submissions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `RELAY_JSON_LOGS` | `false` | JSON log lines |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `RELAY_METRICS_ENABLED` | `true` | Register Prometheus collectors |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, EVENTS_RECEIVED, ORACLES_MATCHED,
    ORACLES_REGISTERED, ORACLE_POOL_SIZE, REGISTRATION_FAILURES, REGISTRY, REQUESTS_SUPPRESSED,
    RESPONSES_SUBMITTED, SUBMISSIONS_IN_FLIGHT, SUBMISSION_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so that startup logs can already be counted
    if config.metrics_enabled {
        register_metrics()?;
    }

    init_logging(config)?;

    Ok(TelemetryGuard {
        metrics_enabled: config.metrics_enabled,
    })
}

/// Guard that keeps telemetry active. Dumps the final metric values on drop.
pub struct TelemetryGuard {
    metrics_enabled: bool,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if !self.metrics_enabled {
            return;
        }
        match encode_metrics() {
            Ok(text) => tracing::debug!(metrics = %text, "Final metrics"),
            Err(e) => tracing::warn!(error = %e, "Failed to encode final metrics"),
        }
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = ORACLES_MATCHED.get();
        metric_inc!(ORACLES_MATCHED);
        assert!(ORACLES_MATCHED.get() >= before + 1.0);

        metric_inc!(EVENTS_RECEIVED, &["other"]);
        assert!(EVENTS_RECEIVED.with_label_values(&["other"]).get() >= 1.0);
    }
}
