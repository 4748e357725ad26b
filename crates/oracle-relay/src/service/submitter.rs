//! Response Submitter
//!
//! One registry transaction per matched oracle. A rejection is the normal
//! fate of late submissions once quorum is reached, so nothing here fails
//! the relay: every call resolves to a [`ResponseAttempt`].

use std::sync::Arc;

use relay_telemetry::{time_histogram, SUBMISSION_DURATION};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{AttemptOutcome, OracleIdentity, ResponseAttempt, StatusCode, StatusRequest};
use crate::metrics::RelayMetrics;
use crate::ports::OracleRegistry;

/// Submits oracle responses with bounded concurrency.
pub struct ResponseSubmitter<R: OracleRegistry> {
    registry: Arc<R>,
    permits: Arc<Semaphore>,
    metrics: Arc<RelayMetrics>,
}

impl<R: OracleRegistry> Clone for ResponseSubmitter<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            permits: Arc::clone(&self.permits),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<R: OracleRegistry + 'static> ResponseSubmitter<R> {
    /// `max_in_flight` is clamped to at least one.
    pub fn new(registry: Arc<R>, max_in_flight: usize, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            registry,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            metrics,
        }
    }

    /// Submissions that may start right now without waiting.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Submit `status` for `request` on behalf of `oracle` and wait for the
    /// registry's answer.
    pub async fn submit(
        &self,
        oracle: &OracleIdentity,
        request: &StatusRequest,
        status: StatusCode,
    ) -> ResponseAttempt {
        self.metrics.submission_started();
        let result = {
            let _timer = time_histogram!(SUBMISSION_DURATION);
            self.registry
                .submit_oracle_response(request.index, &request.subject, status, &oracle.handle)
                .await
        };

        let outcome = match result {
            Ok(()) => {
                debug!(
                    oracle = %oracle.handle,
                    index = request.index,
                    %status,
                    "[submit] Response accepted for {}",
                    request.subject
                );
                AttemptOutcome::Accepted
            }
            Err(e) if e.is_rejection() => {
                debug!(
                    oracle = %oracle.handle,
                    index = request.index,
                    "[submit] Response rejected: {}",
                    e
                );
                AttemptOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                warn!(
                    oracle = %oracle.handle,
                    index = request.index,
                    "[submit] Response outcome unknown: {}",
                    e
                );
                AttemptOutcome::Unknown {
                    reason: e.to_string(),
                }
            }
        };

        self.metrics.submission_finished(&outcome);
        ResponseAttempt {
            oracle: oracle.handle.clone(),
            request_index: request.index,
            status,
            outcome,
        }
    }

    /// Spawn [`submit`](Self::submit) on the runtime. The task waits for a
    /// permit before calling the registry.
    pub fn dispatch(
        &self,
        oracle: OracleIdentity,
        request: StatusRequest,
        status: StatusCode,
        correlation_id: Uuid,
    ) -> JoinHandle<ResponseAttempt> {
        let submitter = self.clone();
        tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = submitter.permits.clone().acquire_owned().await.ok();
            let attempt = submitter.submit(&oracle, &request, status).await;
            debug!(
                %correlation_id,
                oracle = %attempt.oracle,
                outcome = attempt.outcome.label(),
                "[submit] Submission finished"
            );
            attempt
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::adapters::{SimulatedRegistry, SimulatedRegistryConfig};
    use crate::domain::{EventMetadata, IndexTriple, OracleHandle, SubjectKey};
    use crate::error::RegistryError;
    use crate::events::RegistryEvent;
    use crate::ports::RegistrationFee;

    /// Holds every submission until `gate` hands out a permit, tracking how
    /// many calls are inside the registry at once.
    struct GatedRegistry {
        gate: Semaphore,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GatedRegistry {
        fn new() -> Self {
            Self {
                gate: Semaphore::new(0),
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OracleRegistry for GatedRegistry {
        async fn accounts(&self) -> Result<Vec<OracleHandle>, RegistryError> {
            Ok(Vec::new())
        }

        async fn register_oracle(
            &self,
            _fee: RegistrationFee,
            _from: &OracleHandle,
        ) -> Result<(), RegistryError> {
            Ok(())
        }

        async fn my_indexes(&self, from: &OracleHandle) -> Result<[u8; 3], RegistryError> {
            Err(RegistryError::NotRegistered(from.clone()))
        }

        async fn oracles_count(&self) -> Result<u64, RegistryError> {
            Ok(0)
        }

        async fn registration_fee(&self) -> Result<RegistrationFee, RegistryError> {
            Ok(RegistrationFee(1))
        }

        async fn submit_oracle_response(
            &self,
            _index: u8,
            _subject: &SubjectKey,
            _status: StatusCode,
            _from: &OracleHandle,
        ) -> Result<(), RegistryError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| RegistryError::Transport(e.to_string()))?;
            permit.forget();
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn subscribe(&self) -> Result<mpsc::Receiver<RegistryEvent>, RegistryError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
    }

    struct Fixture {
        registry: Arc<SimulatedRegistry>,
        oracle: OracleIdentity,
        metrics: Arc<RelayMetrics>,
    }

    async fn fixture() -> Fixture {
        let registry = Arc::new(SimulatedRegistry::new(SimulatedRegistryConfig {
            account_count: 4,
            seed: Some(3),
            ..SimulatedRegistryConfig::default()
        }));
        let handle = registry.accounts().await.unwrap().remove(0);
        registry.preassign_indexes(&handle, [1, 4, 7]);
        let fee = registry.registration_fee().await.unwrap();
        registry.register_oracle(fee, &handle).await.unwrap();

        Fixture {
            registry,
            oracle: OracleIdentity::new(handle, IndexTriple::new([1, 4, 7]).unwrap()),
            metrics: Arc::new(RelayMetrics::new()),
        }
    }

    fn request(index: u8) -> StatusRequest {
        StatusRequest::new(
            index,
            SubjectKey::new("0xair", "ND1309", 1554952974),
            EventMetadata::at_block(1),
        )
    }

    #[tokio::test]
    async fn test_accepted_submission() {
        let f = fixture().await;
        let req = request(4);
        f.registry.open_request(4, req.subject.clone()).await.unwrap();

        let submitter = ResponseSubmitter::new(Arc::clone(&f.registry), 2, Arc::clone(&f.metrics));
        let attempt = submitter.submit(&f.oracle, &req, StatusCode::OnTime).await;

        assert!(attempt.is_accepted());
        assert_eq!(attempt.request_index, 4);
        assert_eq!(f.metrics.snapshot().responses_accepted, 1);
    }

    #[tokio::test]
    async fn test_closed_request_is_rejected() {
        let f = fixture().await;
        let submitter = ResponseSubmitter::new(Arc::clone(&f.registry), 2, Arc::clone(&f.metrics));

        let attempt = submitter
            .submit(&f.oracle, &request(4), StatusCode::LateAirline)
            .await;

        assert!(matches!(attempt.outcome, AttemptOutcome::Rejected { .. }));
        assert_eq!(f.metrics.snapshot().responses_rejected, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unknown() {
        let f = fixture().await;
        f.registry.set_transport_down(true);
        let submitter = ResponseSubmitter::new(Arc::clone(&f.registry), 2, Arc::clone(&f.metrics));

        let attempt = submitter
            .submit(&f.oracle, &request(4), StatusCode::OnTime)
            .await;

        assert!(matches!(attempt.outcome, AttemptOutcome::Unknown { .. }));
        assert_eq!(f.metrics.snapshot().responses_unknown, 1);
    }

    #[tokio::test]
    async fn test_dispatch_releases_permit() {
        let f = fixture().await;
        let req = request(7);
        f.registry.open_request(7, req.subject.clone()).await.unwrap();
        let submitter = ResponseSubmitter::new(Arc::clone(&f.registry), 1, Arc::clone(&f.metrics));

        let attempt = submitter
            .dispatch(f.oracle.clone(), req, StatusCode::OnTime, Uuid::new_v4())
            .await
            .unwrap();

        assert!(attempt.is_accepted());
        assert_eq!(submitter.available_permits(), 1);
        assert_eq!(f.metrics.snapshot().in_flight, 0);
    }

    #[test]
    fn test_zero_permits_clamped() {
        let registry = Arc::new(SimulatedRegistry::new(SimulatedRegistryConfig::default()));
        let submitter = ResponseSubmitter::new(registry, 0, Arc::new(RelayMetrics::new()));
        assert_eq!(submitter.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_bound_holds() {
        let registry = Arc::new(GatedRegistry::new());
        let metrics = Arc::new(RelayMetrics::new());
        let submitter = ResponseSubmitter::new(Arc::clone(&registry), 2, Arc::clone(&metrics));
        let correlation_id = Uuid::new_v4();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let oracle = OracleIdentity::new(
                    OracleHandle::new(format!("0x{:02x}", i)),
                    IndexTriple::new([1, 4, 7]).unwrap(),
                );
                submitter.dispatch(oracle, request(4), StatusCode::OnTime, correlation_id)
            })
            .collect();

        for _ in 0..200 {
            if registry.current.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Give the queued submissions a chance to overrun the bound.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.current.load(Ordering::SeqCst), 2);
        assert_eq!(submitter.available_permits(), 0);

        registry.gate.add_permits(6);
        for handle in handles {
            assert!(handle.await.unwrap().is_accepted());
        }

        assert_eq!(registry.peak.load(Ordering::SeqCst), 2);
        assert_eq!(submitter.available_permits(), 2);
        assert_eq!(metrics.snapshot().responses_accepted, 6);
    }
}
