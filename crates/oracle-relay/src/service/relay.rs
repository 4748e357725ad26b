//! Event Relay
//!
//! Single dispatcher over the registry event stream. Events are handled in
//! arrival order; each handler call finishes before the next event is
//! taken. Submissions are spawned and may outlive the event that caused
//! them.
//!
//! ```text
//! OracleRequest ──→ match_oracles ──→ StatusSource ──→ ResponseSubmitter::dispatch
//! FlightStatusInfo ──→ RelayState::record_terminal
//! Other ──→ logged, ignored
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    match_oracles, HaltPolicy, RegisteredOraclePool, RelayState, ResponseAttempt, StatusRequest,
    StatusSource,
};
use crate::error::RelayError;
use crate::events::RegistryEvent;
use crate::metrics::RelayMetrics;
use crate::ports::OracleRegistry;
use crate::service::submitter::ResponseSubmitter;

/// What [`EventRelay::handle_event`] did with one event.
#[derive(Debug)]
pub enum EventOutcome {
    /// A request was matched; one spawned submission per matching oracle
    /// (possibly none).
    Dispatched {
        correlation_id: Uuid,
        attempts: Vec<JoinHandle<ResponseAttempt>>,
    },
    /// A request arrived for a halted relay or a concluded subject.
    Suppressed,
    /// A terminal status moved the relay into the halted phase.
    Halted,
    /// A terminal status was recorded without halting the relay.
    Concluded,
    /// Not an event the relay acts on.
    Ignored,
}

impl EventOutcome {
    /// Number of submissions dispatched.
    pub fn dispatched(&self) -> usize {
        match self {
            EventOutcome::Dispatched { attempts, .. } => attempts.len(),
            _ => 0,
        }
    }

    /// Wait for every dispatched submission. Panicked tasks are skipped.
    pub async fn join(self) -> Vec<ResponseAttempt> {
        let EventOutcome::Dispatched { attempts, .. } = self else {
            return Vec::new();
        };
        let mut resolved = Vec::with_capacity(attempts.len());
        for handle in attempts {
            match handle.await {
                Ok(attempt) => resolved.push(attempt),
                Err(e) => error!("[relay] Submission task failed: {}", e),
            }
        }
        resolved
    }
}

/// Dispatches registry events to the matching oracles.
pub struct EventRelay<R: OracleRegistry> {
    pool: Arc<RegisteredOraclePool>,
    submitter: ResponseSubmitter<R>,
    status_source: Arc<dyn StatusSource>,
    state: RelayState,
    metrics: Arc<RelayMetrics>,
}

impl<R: OracleRegistry + 'static> EventRelay<R> {
    pub fn new(
        pool: Arc<RegisteredOraclePool>,
        submitter: ResponseSubmitter<R>,
        status_source: Arc<dyn StatusSource>,
        policy: HaltPolicy,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            pool,
            submitter,
            status_source,
            state: RelayState::new(policy),
            metrics,
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn pool(&self) -> &RegisteredOraclePool {
        &self.pool
    }

    /// Handle one event. Must be called from within a tokio runtime.
    pub fn handle_event(&mut self, event: RegistryEvent) -> EventOutcome {
        self.metrics.record_event(event.kind());
        match event {
            RegistryEvent::OracleRequest(request) => self.on_request(request),
            RegistryEvent::FlightStatusInfo {
                subject,
                status,
                metadata,
            } => {
                info!(
                    block = metadata.block_number,
                    %status,
                    "[relay] Final status for {}",
                    subject
                );
                if self.state.record_terminal(subject) {
                    warn!("[relay] Relay halted, further requests are ignored");
                    EventOutcome::Halted
                } else {
                    EventOutcome::Concluded
                }
            }
            RegistryEvent::Other { name, metadata } => {
                debug!(block = metadata.block_number, "[relay] Ignoring event {}", name);
                EventOutcome::Ignored
            }
        }
    }

    fn on_request(&mut self, request: StatusRequest) -> EventOutcome {
        if self.state.suppresses(&request.subject) {
            debug!(
                index = request.index,
                phase = ?self.state.phase(),
                "[relay] Suppressed request for {}",
                request.subject
            );
            self.metrics.record_suppressed();
            return EventOutcome::Suppressed;
        }

        let correlation_id = Uuid::new_v4();
        let matches = match_oracles(&self.pool, request.index);
        info!(
            %correlation_id,
            index = request.index,
            block = request.metadata.block_number,
            matched = matches.len(),
            "[relay] Request for {}",
            request.subject
        );
        self.metrics.record_matches(matches.len());

        let attempts = matches
            .into_iter()
            .map(|oracle| {
                let status = self.status_source.next_status();
                self.submitter
                    .dispatch(oracle.clone(), request.clone(), status, correlation_id)
            })
            .collect();

        EventOutcome::Dispatched {
            correlation_id,
            attempts,
        }
    }

    /// Handle `backlog` in order, then [`run`](Self::run) over `events`.
    ///
    /// Used for events that arrived before the relay was constructed.
    pub async fn run_with_backlog(
        mut self,
        backlog: Vec<RegistryEvent>,
        events: mpsc::Receiver<RegistryEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        if !backlog.is_empty() {
            debug!(events = backlog.len(), "[relay] Replaying buffered events");
        }
        for event in backlog {
            let _ = self.handle_event(event);
        }
        self.run(events, shutdown).await
    }

    /// Consume `events` until shutdown is signalled.
    ///
    /// The stream ending before shutdown is a lost subscription and is
    /// returned as [`RelayError::SubscriptionClosed`].
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RegistryEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        info!(
            oracles = self.pool.len(),
            policy = %self.state.policy(),
            "[relay] Listening for registry events"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(event) => {
                        // Spawned submissions finish on their own.
                        let _ = self.handle_event(event);
                    }
                    None => {
                        error!("[relay] Registry event stream closed");
                        return Err(RelayError::SubscriptionClosed);
                    }
                },
            }
        }
        info!(
            concluded = self.state.concluded_subjects(),
            "[relay] Shutdown signal received"
        );
        Ok(())
    }
}
