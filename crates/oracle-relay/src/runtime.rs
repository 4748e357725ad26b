//! # Relay Runtime
//!
//! Wires configuration, registry, store, bootstrapper and relay together.
//!
//! ## Startup Sequence
//!
//! 1. Read the account universe and allocate oracle identities
//! 2. Open (and lock) the snapshot store
//! 3. Subscribe to registry events and buffer them while bootstrapping, so
//!    no request is lost and the registry never waits on a full channel
//! 4. Bootstrap the oracle pool
//! 5. Spawn the event relay (and, for the simulated registry, the request
//!    driver)
//! 6. Run until shutdown or until the relay fails

use std::sync::Arc;
use std::time::Duration;

use relay_telemetry::log_event;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::adapters::{JsonFileRegistryStore, SimulatedRegistry};
use crate::config::RelayConfig;
use crate::domain::{allocate_oracles, OracleHandle, StatusSource, SubjectKey};
use crate::error::RelayError;
use crate::events::RegistryEvent;
use crate::metrics::RelayMetrics;
use crate::ports::{OracleRegistry, RegistryStore};
use crate::service::{BootstrapReport, EventRelay, OracleBootstrapper, ResponseSubmitter};

/// Account index of the airline the request driver files requests for.
const DRIVER_AIRLINE_INDEX: usize = 1;

/// Flights the request driver cycles through.
pub static FLIGHT_CATALOGUE: [(&str, u64); 7] = [
    ("ND1309", 1554952974),
    ("ND1310", 1554952975),
    ("ND1311", 1554952976),
    ("ND1312", 1554952977),
    ("ND1313", 1554952978),
    ("ND1314", 1554952979),
    ("ND1315", 1554952980),
];

/// A started relay: the bootstrap outcome and the running dispatcher.
pub struct RunningRelay {
    pub report: BootstrapReport,
    pub task: JoinHandle<Result<(), RelayError>>,
}

/// Allocate identities, subscribe, bootstrap and spawn the relay loop.
///
/// Works against any registry and store; [`RelayRuntime`] uses it with the
/// simulated registry.
pub async fn start_relay<R, S>(
    config: &RelayConfig,
    registry: Arc<R>,
    store: Arc<S>,
    status_source: Arc<dyn StatusSource>,
    metrics: Arc<RelayMetrics>,
    shutdown: watch::Receiver<bool>,
) -> Result<RunningRelay, RelayError>
where
    R: OracleRegistry + 'static,
    S: RegistryStore,
{
    let accounts = registry.accounts().await?;
    let identities = allocate_oracles(
        &accounts,
        config.registry.oracle_start_index,
        config.registry.oracle_count,
    )?;
    debug!(
        accounts = accounts.len(),
        oracles = identities.len(),
        "[runtime] Oracle identities allocated"
    );

    let events = registry.subscribe().await?;
    let (release, released) = oneshot::channel();
    let buffering = tokio::spawn(buffer_events(events, released));

    let bootstrapper = OracleBootstrapper::new(
        Arc::clone(&registry),
        store,
        config.registry.index_bound,
        Arc::clone(&metrics),
    );
    let bootstrapped = bootstrapper.bootstrap(&identities).await;
    // Dropping `release` on error stops the buffer task as well.
    let _ = release.send(());
    let report = bootstrapped?;
    let (events, backlog) = buffering
        .await
        .map_err(task_failed)?;
    if report.pool.is_empty() {
        warn!("[runtime] Oracle pool is empty, requests will find no match");
    }

    let max_in_flight = config
        .dispatch
        .max_in_flight
        .unwrap_or_else(|| report.pool.len());
    let submitter = ResponseSubmitter::new(registry, max_in_flight, Arc::clone(&metrics));
    let relay = EventRelay::new(
        Arc::new(report.pool.clone()),
        submitter,
        status_source,
        config.dispatch.halt_policy,
        metrics,
    );
    let task = tokio::spawn(relay.run_with_backlog(backlog, events, shutdown));

    Ok(RunningRelay { report, task })
}

fn task_failed(e: JoinError) -> RelayError {
    error!("[runtime] Task failed: {}", e);
    RelayError::TaskFailed(e.to_string())
}

/// Drain `events` into memory until `released` fires, then hand the
/// receiver back together with what was drained.
async fn buffer_events(
    mut events: mpsc::Receiver<RegistryEvent>,
    mut released: oneshot::Receiver<()>,
) -> (mpsc::Receiver<RegistryEvent>, Vec<RegistryEvent>) {
    let mut backlog = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = &mut released => break,
            event = events.recv() => match event {
                Some(event) => backlog.push(event),
                None => break,
            },
        }
    }
    // Pick up anything already queued when the release arrived.
    while let Ok(event) = events.try_recv() {
        backlog.push(event);
    }
    debug!(events = backlog.len(), "[runtime] Events buffered during bootstrap");
    (events, backlog)
}

/// The relay process running against the in-process simulated registry.
pub struct RelayRuntime {
    config: RelayConfig,
    registry: Arc<SimulatedRegistry>,
    metrics: Arc<RelayMetrics>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RelayRuntime {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(SimulatedRegistry::new(config.simulated_registry()));
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: RelayConfig, registry: Arc<SimulatedRegistry>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            registry,
            metrics: Arc::new(RelayMetrics::new()),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    pub fn registry(&self) -> Arc<SimulatedRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Sender that stops the runtime when `true` is sent.
    pub fn shutdown_handle(&self) -> Arc<watch::Sender<bool>> {
        Arc::clone(&self.shutdown_tx)
    }

    pub fn shutdown(&self) {
        info!("[runtime] Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[runtime] Failed to send shutdown signal: {}", e);
        }
    }

    /// Run until shutdown. Errors are the ones the process must exit on.
    pub async fn run(&self, status_source: Arc<dyn StatusSource>) -> Result<(), RelayError> {
        // Held until the relay stops so the snapshot lock stays taken.
        let store = Arc::new(JsonFileRegistryStore::open(
            &self.config.storage.snapshot_path,
        )?);

        let running = start_relay(
            &self.config,
            Arc::clone(&self.registry),
            Arc::clone(&store),
            status_source,
            Arc::clone(&self.metrics),
            self.shutdown_rx.clone(),
        )
        .await?;
        log_event!(
            info,
            "runtime",
            "[runtime] Relay started",
            oracles = running.report.pool.len(),
            source = %running.report.source,
            failures = running.report.failures.len()
        );

        let driver = self.spawn_request_driver().await?;
        let result = running.task.await.unwrap_or_else(|e| Err(task_failed(e)));

        if let Some(driver) = driver {
            driver.abort();
        }
        drop(store);
        let summary = self.metrics.snapshot();
        info!(
            requests = summary.requests_received,
            suppressed = summary.requests_suppressed,
            accepted = summary.responses_accepted,
            rejected = summary.responses_rejected,
            unknown = summary.responses_unknown,
            "[runtime] Relay stopped"
        );
        result
    }

    /// Periodically ask the simulated registry for flight statuses.
    async fn spawn_request_driver(&self) -> Result<Option<JoinHandle<()>>, RelayError> {
        let interval_ms = self.config.simulation.request_interval_ms;
        if interval_ms == 0 {
            return Ok(None);
        }
        let accounts = self.registry.accounts().await?;
        let airline = accounts
            .get(DRIVER_AIRLINE_INDEX)
            .cloned()
            .unwrap_or_else(|| OracleHandle::new("0x0"));

        let registry = Arc::clone(&self.registry);
        let mut shutdown = self.shutdown_rx.clone();
        Ok(Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            let mut flights = FLIGHT_CATALOGUE.iter().cycle();
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let Some(&(flight, timestamp)) = flights.next() else {
                            break;
                        };
                        let subject = SubjectKey::new(airline.as_str(), flight, timestamp);
                        match registry.fetch_flight_status(subject).await {
                            Ok(index) => debug!(index, flight, "[driver] Requested flight status"),
                            Err(e) => warn!(flight, "[driver] Status request failed: {}", e),
                        }
                    }
                }
            }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryRegistryStore, SimulatedRegistryConfig};
    use crate::domain::{FixedStatusSource, StatusCode};
    use crate::error::AllocationError;
    use tempfile::TempDir;

    fn small_config(dir: &TempDir) -> RelayConfig {
        let mut config = RelayConfig::default();
        config.registry.oracle_start_index = 2;
        config.registry.oracle_count = 6;
        config.simulation.account_count = 10;
        config.simulation.seed = Some(11);
        config.simulation.request_interval_ms = 0;
        config.storage.snapshot_path = dir.path().join("oracles.json");
        config
    }

    #[tokio::test]
    async fn test_start_relay_bootstraps_pool() {
        let dir = TempDir::new().unwrap();
        let config = small_config(&dir);
        let registry = Arc::new(SimulatedRegistry::new(config.simulated_registry()));
        let store = Arc::new(InMemoryRegistryStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let running = start_relay(
            &config,
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::new(FixedStatusSource(StatusCode::OnTime)),
            Arc::new(RelayMetrics::new()),
            shutdown_rx,
        )
        .await
        .unwrap();

        assert_eq!(running.report.pool.len(), 6);
        assert_eq!(store.snapshot(), running.report.pool);

        shutdown_tx.send(true).unwrap();
        assert!(running.task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_bootstrap_outgrows_event_capacity() {
        let dir = TempDir::new().unwrap();
        let mut config = small_config(&dir);
        config.dispatch.event_capacity = 2;
        config.validate().unwrap();
        let registry = Arc::new(SimulatedRegistry::new(config.simulated_registry()));
        let metrics = Arc::new(RelayMetrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let running = tokio::time::timeout(
            Duration::from_secs(5),
            start_relay(
                &config,
                Arc::clone(&registry),
                Arc::new(InMemoryRegistryStore::new()),
                Arc::new(FixedStatusSource(StatusCode::OnTime)),
                Arc::clone(&metrics),
                shutdown_rx,
            ),
        )
        .await
        .expect("bootstrap blocked on the event channel")
        .unwrap();

        assert_eq!(running.report.pool.len(), 6);
        assert_eq!(registry.registration_calls(), 6);

        // Every registration event is handed to the relay once it starts.
        for _ in 0..200 {
            if metrics.snapshot().other_events == 6 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(metrics.snapshot().other_events, 6);

        shutdown_tx.send(true).unwrap();
        assert!(running.task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_panicked_task_is_reported() {
        let join_error = tokio::spawn(async { panic!("relay loop exploded") })
            .await
            .unwrap_err();

        let err = task_failed(join_error);
        assert!(matches!(&err, RelayError::TaskFailed(reason) if reason.contains("panic")));
        assert!(!matches!(err, RelayError::SubscriptionClosed));
    }

    #[tokio::test]
    async fn test_start_relay_rejects_small_universe() {
        let dir = TempDir::new().unwrap();
        let mut config = small_config(&dir);
        config.registry.oracle_count = 30;
        let registry = Arc::new(SimulatedRegistry::new(SimulatedRegistryConfig {
            account_count: 10,
            ..SimulatedRegistryConfig::default()
        }));
        let (_tx, rx) = watch::channel(false);

        let err = start_relay(
            &config,
            registry,
            Arc::new(InMemoryRegistryStore::new()),
            Arc::new(FixedStatusSource(StatusCode::OnTime)),
            Arc::new(RelayMetrics::new()),
            rx,
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(
            err,
            RelayError::Allocation(AllocationError::NotEnoughAccounts { .. })
        ));
    }

    #[tokio::test]
    async fn test_runtime_persists_and_stops() {
        let dir = TempDir::new().unwrap();
        let config = small_config(&dir);
        let runtime = Arc::new(RelayRuntime::new(config));

        let task = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move {
                runtime
                    .run(Arc::new(FixedStatusSource(StatusCode::LateWeather)))
                    .await
            })
        };

        // Bootstrap finishes once the snapshot exists.
        let snapshot = dir.path().join("oracles.json");
        for _ in 0..200 {
            if snapshot.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(snapshot.exists());

        runtime.shutdown();
        assert!(task.await.unwrap().is_ok());
        assert_eq!(runtime.registry().registration_calls(), 6);
    }
}
