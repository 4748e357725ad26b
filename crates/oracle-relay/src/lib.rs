//! # Oracle Relay
//!
//! Off-chain relay for an oracle consensus registry. A fixed set of oracle
//! identities is registered once; each holds three request indices. For
//! every status request the registry emits, the relay finds the oracles
//! holding that index and submits one status response per oracle. The
//! registry decides on quorum.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `RegisteredOraclePool`, `OracleIdentity`, `IndexTriple`
//!   - `match_oracles`: request index to matching oracles
//!   - `StatusSource`: injectable status generation
//!   - `RelayState`: halt state under a `HaltPolicy`
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `OracleRegistry`: the external registry (driven port)
//!   - `RegistryStore`: durable pool snapshot (driven port)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `OracleBootstrapper`, `ResponseSubmitter`, `EventRelay`
//!
//! - **Adapters Layer** (`adapters/`)
//!   - `JsonFileRegistryStore`, `InMemoryRegistryStore`
//!   - `SimulatedRegistry`: in-process registry for local runs and tests
//!
//! - **Events Layer** (`events/`): decoded registry events
//!
//! ## Invariants
//!
//! - Every pool member has 3 distinct indices below the index bound
//! - A bootstrapped pool is never registered twice
//! - Events are handled in arrival order; submissions are unordered
//! - Under `HaltPolicy::Global` no request is served after the first final
//!   status
//!
//! ## Usage Example
//!
//! ```ignore
//! use oracle_relay::{RelayConfig, RelayRuntime, UniformStatusSource};
//! use std::sync::Arc;
//!
//! let runtime = RelayRuntime::new(RelayConfig::load()?);
//! runtime.run(Arc::new(UniformStatusSource)).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod runtime;
pub mod service;

// Re-exports for convenience
pub use adapters::{
    InMemoryRegistryStore, JsonFileRegistryStore, SimulatedRegistry, SimulatedRegistryConfig,
};
pub use config::RelayConfig;
pub use domain::{
    match_oracles, AttemptOutcome, EventMetadata, FixedStatusSource, HaltPolicy, IndexTriple,
    OracleHandle, OracleIdentity, RegisteredOraclePool, RelayState, ResponseAttempt,
    SequenceStatusSource, StatusCode, StatusRequest, StatusSource, SubjectKey,
    UniformStatusSource,
};
pub use error::{AllocationError, ConfigError, DomainError, RegistryError, RelayError, StoreError};
pub use events::{EventKind, RegistryEvent};
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use ports::{OracleRegistry, RegistrationFee, RegistryStore};
pub use runtime::{start_relay, RelayRuntime, RunningRelay};
pub use service::{
    BootstrapReport, BootstrapSource, EventOutcome, EventRelay, OracleBootstrapper,
    ResponseSubmitter,
};
