//! Events Layer
//!
//! Decoded registry events delivered to the relay over its subscription.

pub mod registry;

pub use registry::{EventKind, RegistryEvent};
