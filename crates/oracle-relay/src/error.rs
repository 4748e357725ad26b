//! Error types for the oracle relay

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::OracleHandle;

/// Errors raised by the external oracle registry client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry executed the call and refused it (revert).
    #[error("Registry rejected call: {reason}")]
    Rejected { reason: String },

    #[error("Oracle not registered: {0}")]
    NotRegistered(OracleHandle),

    /// The registry could not be reached or the connection dropped.
    #[error("Registry transport error: {0}")]
    Transport(String),

    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),
}

impl RegistryError {
    /// Convenience constructor for a revert.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Whether this error is the registry refusing the call, as opposed to
    /// the call never reaching it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::NotRegistered(_))
    }
}

/// Errors from the registry snapshot store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot exists but cannot be parsed into a valid pool.
    #[error("Snapshot at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Snapshot {path} is locked by another relay process")]
    Locked { path: PathBuf },

    #[error("Snapshot serialization error: {0}")]
    Serialization(String),
}

/// Invariant violations on domain values
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid index triple {values:?}: {reason}")]
    InvalidTriple { values: Vec<u8>, reason: String },

    #[error("Oracle already in pool: {0}")]
    DuplicateOracle(OracleHandle),

    #[error("Invalid status code: {0}")]
    InvalidStatus(u8),
}

/// Errors while selecting oracle identities from the account universe
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("No accounts provided by the registry")]
    NoAccounts,

    #[error("Start index {start} is beyond the {available} available accounts")]
    StartBeyondAccounts { start: usize, available: usize },

    #[error("Need accounts {start}..{end} but only {available} are available")]
    NotEnoughAccounts {
        start: usize,
        end: usize,
        available: usize,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Top-level relay errors
///
/// Everything that reaches this type is meant for the runtime's supervision:
/// per-oracle registration failures and submission rejections never do.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The registry event stream ended while the relay was still running.
    #[error("Registry event subscription closed unexpectedly")]
    SubscriptionClosed,

    /// A relay task panicked or was cancelled.
    #[error("Relay task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(RegistryError::rejected("quorum reached").is_rejection());
        assert!(RegistryError::NotRegistered(OracleHandle::new("0xabc")).is_rejection());
        assert!(!RegistryError::Transport("socket closed".into()).is_rejection());
        assert!(!RegistryError::InvalidResponse("short".into()).is_rejection());
    }

    #[test]
    fn test_relay_error_from_registry() {
        let err: RelayError = RegistryError::Transport("down".into()).into();
        assert!(matches!(err, RelayError::Registry(RegistryError::Transport(_))));
        assert!(err.to_string().contains("down"));
    }
}
