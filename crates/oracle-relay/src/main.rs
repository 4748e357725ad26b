//! # Oracle Relay
//!
//! Runs the relay against the in-process simulated registry.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logs, metrics)
//! 2. Load configuration (defaults, `RELAY_CONFIG` file, environment)
//! 3. Bootstrap the oracle pool and start the relay
//! 4. Run until Ctrl+C or until the relay fails

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use oracle_relay::{RelayConfig, RelayRuntime, UniformStatusSource};
use relay_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let _telemetry =
        init_telemetry(&telemetry_config).context("Failed to initialize telemetry")?;
    info!(service = %telemetry_config.service_name, "Starting oracle relay");

    let config = RelayConfig::load().context("Failed to load relay configuration")?;
    info!(
        oracles = config.registry.oracle_count,
        snapshot = %config.storage.snapshot_path.display(),
        policy = %config.dispatch.halt_policy,
        "Configuration loaded"
    );

    let runtime = RelayRuntime::new(config);
    let shutdown = runtime.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, stopping relay");
                let _ = shutdown.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    runtime
        .run(Arc::new(UniformStatusSource))
        .await
        .context("Oracle relay terminated")?;

    info!("Shutdown complete");
    Ok(())
}
