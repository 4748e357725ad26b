//! In-process simulated oracle registry
//!
//! Stands in for the ledger contract during local runs and tests. It keeps
//! the behavior the relay depends on:
//!
//! - a fixed account universe
//! - a registration fee; every accepted registration assigns three
//!   distinct random indices below the index bound (re-registering
//!   overwrites them and charges again)
//! - `fetch_flight_status` opens a request under a random index and emits
//!   `OracleRequest`
//! - responses are accepted only from registered oracles holding the
//!   request index, while the request is open, once per oracle
//! - `min_responses` agreeing reports emit `FlightStatusInfo` and close the
//!   request; later reports are rejected
//!
//! Fault hooks (`set_transport_down`, `fail_registration_for`,
//! `reject_submissions_from`, `drop_subscriptions`) let tests drive the
//! relay's error paths.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{
    EventMetadata, OracleHandle, StatusCode, StatusRequest, SubjectKey, INDEX_BOUND,
};
use crate::error::RegistryError;
use crate::events::RegistryEvent;
use crate::ports::{OracleRegistry, RegistrationFee};

/// 1 ether in wei.
pub const DEFAULT_REGISTRATION_FEE: RegistrationFee = RegistrationFee(1_000_000_000_000_000_000);

/// Agreeing reports needed before a status is final.
pub const DEFAULT_MIN_RESPONSES: usize = 3;

/// Settings for [`SimulatedRegistry`].
#[derive(Clone, Debug)]
pub struct SimulatedRegistryConfig {
    /// Size of the account universe.
    pub account_count: usize,
    /// Exclusive upper bound of assigned indices.
    pub index_bound: u8,
    pub min_responses: usize,
    pub registration_fee: RegistrationFee,
    /// Capacity of each subscription channel.
    pub event_capacity: usize,
    /// Fixed RNG seed for reproducible accounts and indices.
    pub seed: Option<u64>,
}

impl Default for SimulatedRegistryConfig {
    fn default() -> Self {
        Self {
            account_count: 50,
            index_bound: INDEX_BOUND,
            min_responses: DEFAULT_MIN_RESPONSES,
            registration_fee: DEFAULT_REGISTRATION_FEE,
            event_capacity: 256,
            seed: None,
        }
    }
}

#[derive(Default)]
struct OpenRequest {
    responded: HashSet<OracleHandle>,
    reports: HashMap<StatusCode, usize>,
}

struct Inner {
    rng: StdRng,
    accounts: Vec<OracleHandle>,
    oracles: HashMap<OracleHandle, [u8; 3]>,
    preassigned: HashMap<OracleHandle, [u8; 3]>,
    open_requests: HashMap<(u8, SubjectKey), OpenRequest>,
    block_number: u64,
    subscribers: Vec<mpsc::Sender<RegistryEvent>>,
    transport_down: bool,
    failing_registrations: HashSet<OracleHandle>,
    rejecting_submissions: HashSet<OracleHandle>,
    registration_calls: usize,
    submission_calls: usize,
}

impl Inner {
    fn next_metadata(&mut self) -> EventMetadata {
        self.block_number += 1;
        let mut tx_hash = [0u8; 32];
        self.rng.fill_bytes(&mut tx_hash);
        EventMetadata {
            block_number: self.block_number,
            transaction_hash: Some(format!("0x{}", hex::encode(tx_hash))),
        }
    }

    fn check_transport(&self) -> Result<(), RegistryError> {
        if self.transport_down {
            return Err(RegistryError::Transport(
                "simulated registry unreachable".to_string(),
            ));
        }
        Ok(())
    }

    fn generate_indexes(&mut self, bound: u8) -> [u8; 3] {
        let picked = rand::seq::index::sample(&mut self.rng, bound as usize, 3);
        [picked.index(0) as u8, picked.index(1) as u8, picked.index(2) as u8]
    }
}

/// Simulated [`OracleRegistry`].
pub struct SimulatedRegistry {
    config: SimulatedRegistryConfig,
    inner: Mutex<Inner>,
}

impl SimulatedRegistry {
    pub fn new(config: SimulatedRegistryConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let accounts = (0..config.account_count)
            .map(|_| {
                let mut address = [0u8; 20];
                rng.fill_bytes(&mut address);
                OracleHandle::new(format!("0x{}", hex::encode(address)))
            })
            .collect();

        Self {
            config,
            inner: Mutex::new(Inner {
                rng,
                accounts,
                oracles: HashMap::new(),
                preassigned: HashMap::new(),
                open_requests: HashMap::new(),
                block_number: 0,
                subscribers: Vec::new(),
                transport_down: false,
                failing_registrations: HashSet::new(),
                rejecting_submissions: HashSet::new(),
                registration_calls: 0,
                submission_calls: 0,
            }),
        }
    }

    pub fn config(&self) -> &SimulatedRegistryConfig {
        &self.config
    }

    /// Consumer side: request a status for `subject` under a random index.
    ///
    /// Returns the chosen index.
    pub async fn fetch_flight_status(&self, subject: SubjectKey) -> Result<u8, RegistryError> {
        let index = {
            let mut inner = self.inner.lock();
            inner.check_transport()?;
            inner.rng.gen_range(0..self.config.index_bound)
        };
        self.open_request(index, subject).await?;
        Ok(index)
    }

    /// Consumer side: request a status for `subject` under a chosen index.
    pub async fn open_request(&self, index: u8, subject: SubjectKey) -> Result<(), RegistryError> {
        let (event, subscribers) = {
            let mut inner = self.inner.lock();
            inner.check_transport()?;
            inner
                .open_requests
                .insert((index, subject.clone()), OpenRequest::default());
            let metadata = inner.next_metadata();
            let event = RegistryEvent::OracleRequest(StatusRequest::new(index, subject, metadata));
            (event, inner.subscribers.clone())
        };
        broadcast(subscribers, vec![event]).await;
        Ok(())
    }

    /// Indices the next registration of `handle` receives.
    pub fn preassign_indexes(&self, handle: &OracleHandle, indexes: [u8; 3]) {
        self.inner.lock().preassigned.insert(handle.clone(), indexes);
    }

    pub fn set_transport_down(&self, down: bool) {
        self.inner.lock().transport_down = down;
    }

    pub fn fail_registration_for(&self, handle: &OracleHandle) {
        self.inner.lock().failing_registrations.insert(handle.clone());
    }

    pub fn reject_submissions_from(&self, handle: &OracleHandle) {
        self.inner.lock().rejecting_submissions.insert(handle.clone());
    }

    /// Close every open subscription, as a dropped websocket would.
    pub fn drop_subscriptions(&self) {
        self.inner.lock().subscribers.clear();
    }

    /// Number of `register_oracle` calls received, failed ones included.
    pub fn registration_calls(&self) -> usize {
        self.inner.lock().registration_calls
    }

    /// Number of `submit_oracle_response` calls received.
    pub fn submission_calls(&self) -> usize {
        self.inner.lock().submission_calls
    }

    /// Whether the request is still collecting reports.
    pub fn is_open(&self, index: u8, subject: &SubjectKey) -> bool {
        self.inner
            .lock()
            .open_requests
            .contains_key(&(index, subject.clone()))
    }
}

async fn broadcast(subscribers: Vec<mpsc::Sender<RegistryEvent>>, events: Vec<RegistryEvent>) {
    for event in events {
        for tx in &subscribers {
            if tx.send(event.clone()).await.is_err() {
                debug!("[registry] Dropping event for closed subscriber");
            }
        }
    }
}

#[async_trait]
impl OracleRegistry for SimulatedRegistry {
    async fn accounts(&self) -> Result<Vec<OracleHandle>, RegistryError> {
        let inner = self.inner.lock();
        inner.check_transport()?;
        Ok(inner.accounts.clone())
    }

    async fn register_oracle(
        &self,
        fee: RegistrationFee,
        from: &OracleHandle,
    ) -> Result<(), RegistryError> {
        let (events, subscribers) = {
            let mut inner = self.inner.lock();
            inner.check_transport()?;
            inner.registration_calls += 1;

            if fee < self.config.registration_fee {
                return Err(RegistryError::rejected("Registration fee is required"));
            }
            if inner.failing_registrations.contains(from) {
                return Err(RegistryError::rejected("Registration refused"));
            }

            let indexes = match inner.preassigned.remove(from) {
                Some(indexes) => indexes,
                None => inner.generate_indexes(self.config.index_bound),
            };
            inner.oracles.insert(from.clone(), indexes);

            let metadata = inner.next_metadata();
            let event = RegistryEvent::Other {
                name: "OracleRegistered".to_string(),
                metadata,
            };
            (vec![event], inner.subscribers.clone())
        };
        broadcast(subscribers, events).await;
        Ok(())
    }

    async fn my_indexes(&self, from: &OracleHandle) -> Result<[u8; 3], RegistryError> {
        let inner = self.inner.lock();
        inner.check_transport()?;
        inner
            .oracles
            .get(from)
            .copied()
            .ok_or_else(|| RegistryError::NotRegistered(from.clone()))
    }

    async fn oracles_count(&self) -> Result<u64, RegistryError> {
        let inner = self.inner.lock();
        inner.check_transport()?;
        Ok(inner.oracles.len() as u64)
    }

    async fn registration_fee(&self) -> Result<RegistrationFee, RegistryError> {
        self.inner.lock().check_transport()?;
        Ok(self.config.registration_fee)
    }

    async fn submit_oracle_response(
        &self,
        index: u8,
        subject: &SubjectKey,
        status: StatusCode,
        from: &OracleHandle,
    ) -> Result<(), RegistryError> {
        let (events, subscribers) = {
            let mut inner = self.inner.lock();
            inner.check_transport()?;
            inner.submission_calls += 1;

            if inner.rejecting_submissions.contains(from) {
                return Err(RegistryError::rejected("Submission refused"));
            }
            let indexes = inner
                .oracles
                .get(from)
                .copied()
                .ok_or_else(|| RegistryError::NotRegistered(from.clone()))?;
            if !indexes.contains(&index) {
                return Err(RegistryError::rejected(
                    "Index does not match oracle request",
                ));
            }

            let key = (index, subject.clone());
            let request = inner.open_requests.get_mut(&key).ok_or_else(|| {
                RegistryError::rejected("Flight or timestamp do not match oracle request")
            })?;
            if !request.responded.insert(from.clone()) {
                return Err(RegistryError::rejected("Oracle already responded"));
            }
            let reports = request.reports.entry(status).or_insert(0);
            *reports += 1;
            let reached = *reports >= self.config.min_responses;

            let mut events = vec![RegistryEvent::Other {
                name: "OracleReport".to_string(),
                metadata: inner.next_metadata(),
            }];
            if reached {
                inner.open_requests.remove(&key);
                events.push(RegistryEvent::FlightStatusInfo {
                    subject: subject.clone(),
                    status,
                    metadata: inner.next_metadata(),
                });
            }
            (events, inner.subscribers.clone())
        };
        broadcast(subscribers, events).await;
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<RegistryEvent>, RegistryError> {
        let mut inner = self.inner.lock();
        inner.check_transport()?;
        let (tx, rx) = mpsc::channel(self.config.event_capacity.max(1));
        inner.subscribers.retain(|s| !s.is_closed());
        inner.subscribers.push(tx);
        Ok(rx)
    }
}
