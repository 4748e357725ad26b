//! Service Layer
//!
//! Orchestrates the domain against the outbound ports:
//! - `OracleBootstrapper`: registers oracles and persists their triples
//! - `ResponseSubmitter`: one bounded, failure-tolerant submission per oracle
//! - `EventRelay`: single dispatcher over the registry event stream

pub mod bootstrapper;
pub mod relay;
pub mod submitter;

pub use bootstrapper::{BootstrapFailure, BootstrapReport, BootstrapSource, OracleBootstrapper};
pub use relay::{EventOutcome, EventRelay};
pub use submitter::ResponseSubmitter;
