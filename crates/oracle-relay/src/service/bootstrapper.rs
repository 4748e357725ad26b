//! Oracle Bootstrapper
//!
//! Brings the registered oracle pool into existence exactly once:
//!
//! 1. A non-empty snapshot in the store is taken as-is, unless a triple
//!    falls outside the index bound, which is handled like a corrupt one.
//! 2. Otherwise, if the registry already counts oracles, their triples are
//!    recovered with `my_indexes` and nothing is registered.
//! 3. Otherwise every identity is registered (fee fetched once) and its
//!    triple read back.
//! 4. The resulting pool is saved.
//!
//! Per-identity failures are reported, not fatal. Failures of the shared
//! queries (fee, count) and of `save` abort.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use relay_telemetry::log_oracle_event;
use tracing::{debug, error, info, warn};

use crate::domain::{IndexTriple, OracleHandle, OracleIdentity, RegisteredOraclePool};
use crate::error::{RegistryError, RelayError, StoreError};
use crate::metrics::RelayMetrics;
use crate::ports::{OracleRegistry, RegistrationFee, RegistryStore};

/// Where the bootstrapped pool came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapSource {
    /// Loaded from the local snapshot.
    Snapshot,
    /// Read back from a registry that already had oracles.
    RegistryRecovery,
    /// Freshly registered by this process.
    Registration,
}

impl fmt::Display for BootstrapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BootstrapSource::Snapshot => "snapshot",
            BootstrapSource::RegistryRecovery => "registry-recovery",
            BootstrapSource::Registration => "registration",
        };
        f.write_str(label)
    }
}

/// An identity that did not make it into the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapFailure {
    pub handle: OracleHandle,
    pub reason: String,
}

/// Result of [`OracleBootstrapper::bootstrap`].
#[derive(Debug)]
pub struct BootstrapReport {
    pub pool: RegisteredOraclePool,
    pub source: BootstrapSource,
    pub failures: Vec<BootstrapFailure>,
    /// Set when the snapshot was unreadable and the registry was used instead.
    pub store_fault: Option<String>,
}

impl BootstrapReport {
    /// No identity failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Registers oracle identities and persists their index triples.
pub struct OracleBootstrapper<R: OracleRegistry, S: RegistryStore> {
    registry: Arc<R>,
    store: Arc<S>,
    index_bound: u8,
    metrics: Arc<RelayMetrics>,
}

impl<R: OracleRegistry, S: RegistryStore> OracleBootstrapper<R, S> {
    pub fn new(
        registry: Arc<R>,
        store: Arc<S>,
        index_bound: u8,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            registry,
            store,
            index_bound,
            metrics,
        }
    }

    /// Build the pool for `identities`. See the module docs for the steps.
    pub async fn bootstrap(
        &self,
        identities: &[OracleHandle],
    ) -> Result<BootstrapReport, RelayError> {
        let mut store_fault = None;
        match self.store.load() {
            Ok(pool) if !pool.is_empty() => {
                let out_of_bound = pool
                    .iter()
                    .find(|o| !o.index_triple.within(self.index_bound))
                    .map(|oracle| {
                        format!(
                            "snapshot triple {:?} of {} is outside index bound {}",
                            oracle.index_triple.values(),
                            oracle.handle,
                            self.index_bound
                        )
                    });
                if let Some(fault) = out_of_bound {
                    error!("[bootstrap] Ignoring invalid snapshot: {}", fault);
                    store_fault = Some(fault);
                } else {
                    info!(
                        oracles = pool.len(),
                        "[bootstrap] Restored oracle pool from snapshot"
                    );
                    self.metrics.record_pool_size(pool.len());
                    return Ok(BootstrapReport {
                        pool,
                        source: BootstrapSource::Snapshot,
                        failures: Vec::new(),
                        store_fault,
                    });
                }
            }
            Ok(_) => debug!("[bootstrap] No snapshot, consulting registry"),
            Err(e @ StoreError::Corrupt { .. }) => {
                error!("[bootstrap] Ignoring unreadable snapshot: {}", e);
                store_fault = Some(e.to_string());
            }
            Err(e) => return Err(e.into()),
        }

        let identities = dedup(identities);
        let registered = self.registry.oracles_count().await?;

        let (pool, failures, source) = if registered > 0 {
            info!(
                registered,
                "[bootstrap] Registry already has oracles, recovering index triples"
            );
            let (pool, failures) = self.recover(&identities).await;
            (pool, failures, BootstrapSource::RegistryRecovery)
        } else {
            let fee = self.registry.registration_fee().await?;
            info!(%fee, oracles = identities.len(), "[bootstrap] Registering oracles");
            let (pool, failures) = self.register_all(&identities, fee).await;
            (pool, failures, BootstrapSource::Registration)
        };

        if !failures.is_empty() {
            error!(
                bootstrapped = pool.len(),
                failed = failures.len(),
                expected = identities.len(),
                "[bootstrap] Partial bootstrap: {} of {} oracles available",
                pool.len(),
                identities.len()
            );
        }

        if !pool.is_empty() {
            self.store.save(&pool)?;
        }
        self.metrics.record_pool_size(pool.len());
        info!(
            oracles = pool.len(),
            source = %source,
            "[bootstrap] Oracle pool ready"
        );

        Ok(BootstrapReport {
            pool,
            source,
            failures,
            store_fault,
        })
    }

    async fn register_all(
        &self,
        identities: &[OracleHandle],
        fee: RegistrationFee,
    ) -> (RegisteredOraclePool, Vec<BootstrapFailure>) {
        let mut pool = RegisteredOraclePool::new();
        let mut failures = Vec::new();

        for handle in identities {
            if let Err(e) = self.registry.register_oracle(fee, handle).await {
                error!(oracle = %handle, "[bootstrap] Registration failed: {}", e);
                self.metrics.record_registration_failure();
                failures.push(failure(handle, e.to_string()));
                continue;
            }
            self.metrics.record_registration();

            match self.fetch_triple(handle).await {
                Ok(triple) => {
                    log_oracle_event!(
                        info,
                        "bootstrap",
                        "[bootstrap] Oracle registered",
                        handle,
                        indexes = %triple
                    );
                    insert(&mut pool, &mut failures, OracleIdentity::new(handle.clone(), triple));
                }
                Err(reason) => {
                    error!(oracle = %handle, "[bootstrap] Index lookup failed: {}", reason);
                    failures.push(failure(handle, reason));
                }
            }
        }
        (pool, failures)
    }

    async fn recover(
        &self,
        identities: &[OracleHandle],
    ) -> (RegisteredOraclePool, Vec<BootstrapFailure>) {
        let mut pool = RegisteredOraclePool::new();
        let mut failures = Vec::new();

        for handle in identities {
            match self.fetch_triple(handle).await {
                Ok(triple) => {
                    debug!(oracle = %handle, indexes = %triple, "[bootstrap] Recovered triple");
                    insert(&mut pool, &mut failures, OracleIdentity::new(handle.clone(), triple));
                }
                Err(reason) => {
                    warn!(oracle = %handle, "[bootstrap] Skipping oracle: {}", reason);
                    failures.push(failure(handle, reason));
                }
            }
        }
        (pool, failures)
    }

    /// Read and validate the triple the registry holds for `handle`.
    async fn fetch_triple(&self, handle: &OracleHandle) -> Result<IndexTriple, String> {
        let raw = self
            .registry
            .my_indexes(handle)
            .await
            .map_err(|e: RegistryError| e.to_string())?;
        IndexTriple::bounded(raw, self.index_bound).map_err(|e| e.to_string())
    }
}

fn dedup(identities: &[OracleHandle]) -> Vec<OracleHandle> {
    let mut seen = HashSet::new();
    let unique: Vec<_> = identities
        .iter()
        .filter(|h| seen.insert((*h).clone()))
        .cloned()
        .collect();
    if unique.len() != identities.len() {
        warn!(
            duplicates = identities.len() - unique.len(),
            "[bootstrap] Duplicate oracle identities ignored"
        );
    }
    unique
}

fn insert(
    pool: &mut RegisteredOraclePool,
    failures: &mut Vec<BootstrapFailure>,
    identity: OracleIdentity,
) {
    let handle = identity.handle.clone();
    if let Err(e) = pool.insert(identity) {
        failures.push(failure(&handle, e.to_string()));
    }
}

fn failure(handle: &OracleHandle, reason: String) -> BootstrapFailure {
    BootstrapFailure {
        handle: handle.clone(),
        reason,
    }
}
