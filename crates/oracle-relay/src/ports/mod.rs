//! Ports Layer
//!
//! Defines the interfaces (traits) the relay depends on:
//! - `OracleRegistry`: the external ledger-backed registry (driven port)
//! - `RegistryStore`: durable snapshot of the bootstrapped pool (driven port)

pub mod outbound;

pub use outbound::{OracleRegistry, RegistrationFee, RegistryStore};
