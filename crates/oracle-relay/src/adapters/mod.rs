//! Adapters Layer
//!
//! Implementations of the outbound ports:
//! - `JsonFileRegistryStore`: durable snapshot on disk
//! - `InMemoryRegistryStore`: volatile snapshot for tests
//! - `SimulatedRegistry`: in-process stand-in for the ledger registry

pub mod json_store;
pub mod memory_store;
pub mod simulated_registry;

pub use json_store::JsonFileRegistryStore;
pub use memory_store::InMemoryRegistryStore;
pub use simulated_registry::{
    SimulatedRegistry, SimulatedRegistryConfig, DEFAULT_MIN_RESPONSES, DEFAULT_REGISTRATION_FEE,
};
