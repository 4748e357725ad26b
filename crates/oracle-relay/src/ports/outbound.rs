//! Outbound Ports (Driven Ports)
//!
//! Dependencies the relay needs from the outside world. The ledger client
//! and the contract behind it are not part of this crate; only the calls
//! below are relied upon.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{OracleHandle, RegisteredOraclePool, StatusCode, SubjectKey};
use crate::error::{RegistryError, StoreError};
use crate::events::RegistryEvent;

/// Fee the registry charges per oracle registration, in the ledger's base unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrationFee(pub u128);

impl fmt::Display for RegistrationFee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

/// External oracle registry (Driven Port)
///
/// Every method is a round trip to the ledger. Idempotency of
/// `register_oracle` is the caller's responsibility.
#[async_trait]
pub trait OracleRegistry: Send + Sync {
    /// Account universe the oracle identities are drawn from.
    async fn accounts(&self) -> Result<Vec<OracleHandle>, RegistryError>;

    /// Register `from` as an oracle, paying `fee`.
    async fn register_oracle(
        &self,
        fee: RegistrationFee,
        from: &OracleHandle,
    ) -> Result<(), RegistryError>;

    /// Raw indices assigned to `from`. Validation is left to the caller.
    async fn my_indexes(&self, from: &OracleHandle) -> Result<[u8; 3], RegistryError>;

    /// Number of oracles registered so far.
    async fn oracles_count(&self) -> Result<u64, RegistryError>;

    async fn registration_fee(&self) -> Result<RegistrationFee, RegistryError>;

    /// Submit `status` for the request identified by `index` and `subject`,
    /// attributed to `from`. `Rejected` is a normal answer.
    async fn submit_oracle_response(
        &self,
        index: u8,
        subject: &SubjectKey,
        status: StatusCode,
        from: &OracleHandle,
    ) -> Result<(), RegistryError>;

    /// Open a bounded, ordered stream of decoded registry events.
    ///
    /// The stream ending means the subscription dropped.
    async fn subscribe(&self) -> Result<mpsc::Receiver<RegistryEvent>, RegistryError>;
}

/// Durable snapshot of the bootstrapped pool (Driven Port)
///
/// Single relay process assumed.
pub trait RegistryStore: Send + Sync {
    /// Load the last saved pool. A missing snapshot yields an empty pool.
    fn load(&self) -> Result<RegisteredOraclePool, StoreError>;

    /// Replace the snapshot. Either the old or the new snapshot survives a
    /// crash, never a partial one.
    fn save(&self, pool: &RegisteredOraclePool) -> Result<(), StoreError>;
}
