//! Domain Layer - Pure relay logic
//!
//! This layer contains:
//! - Oracle identities, index triples and the registered pool
//! - Request matching
//! - Status codes and status sources
//! - Relay halt state
//! - Identity allocation from the account universe
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod allocation;
pub mod matcher;
pub mod oracle;
pub mod request;
pub mod state;
pub mod status;

pub use allocation::{allocate_oracles, DEFAULT_ORACLE_COUNT, DEFAULT_ORACLE_START_INDEX};
pub use matcher::match_oracles;
pub use oracle::{IndexTriple, OracleHandle, OracleIdentity, RegisteredOraclePool, INDEX_BOUND};
pub use request::{AttemptOutcome, EventMetadata, ResponseAttempt, StatusRequest, SubjectKey};
pub use state::{HaltPolicy, RelayPhase, RelayState};
pub use status::{
    FixedStatusSource, SequenceStatusSource, StatusCode, StatusSource, UniformStatusSource,
};
