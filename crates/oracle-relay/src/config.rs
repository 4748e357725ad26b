//! # Relay Configuration
//!
//! Defaults, an optional JSON file and environment overrides, applied in
//! that order, then validated.
//!
//! ## Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `RELAY_CONFIG` | path of the JSON config file |
//! | `RELAY_SNAPSHOT_PATH` | `storage.snapshot_path` |
//! | `RELAY_ORACLE_START_INDEX` | `registry.oracle_start_index` |
//! | `RELAY_ORACLE_COUNT` | `registry.oracle_count` |
//! | `RELAY_HALT_POLICY` | `dispatch.halt_policy` (`global`, `per-subject`) |
//! | `RELAY_MAX_IN_FLIGHT` | `dispatch.max_in_flight` |
//! | `RELAY_EVENT_CAPACITY` | `dispatch.event_capacity` |
//! | `RELAY_REQUEST_INTERVAL_MS` | `simulation.request_interval_ms` |
//! | `RELAY_SIMULATION_SEED` | `simulation.seed` |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapters::{SimulatedRegistryConfig, DEFAULT_MIN_RESPONSES, DEFAULT_REGISTRATION_FEE};
use crate::domain::{HaltPolicy, DEFAULT_ORACLE_COUNT, DEFAULT_ORACLE_START_INDEX, INDEX_BOUND};
use crate::error::ConfigError;

/// Complete relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub registry: RegistryConfig,
    pub storage: StorageConfig,
    pub dispatch: DispatchConfig,
    pub simulation: SimulationConfig,
}

/// Which accounts are oracles and what indices to expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// First account (in the registry's account list) used as an oracle.
    pub oracle_start_index: usize,
    /// Number of oracle identities to bootstrap.
    pub oracle_count: usize,
    /// Exclusive upper bound of valid request indices.
    pub index_bound: u8,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            oracle_start_index: DEFAULT_ORACLE_START_INDEX,
            oracle_count: DEFAULT_ORACLE_COUNT,
            index_bound: INDEX_BOUND,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot of the bootstrapped pool.
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./data/oracles.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub halt_policy: HaltPolicy,
    /// Bound on concurrent response submissions. `None` sizes it to the pool.
    pub max_in_flight: Option<usize>,
    /// Capacity of the registry event channel.
    pub event_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            halt_policy: HaltPolicy::Global,
            max_in_flight: None,
            event_capacity: 256,
        }
    }
}

/// Settings of the in-process simulated registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub account_count: usize,
    pub min_responses: usize,
    pub seed: Option<u64>,
    /// Period of synthetic flight status requests. 0 disables them.
    pub request_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            account_count: 50,
            min_responses: DEFAULT_MIN_RESPONSES,
            seed: None,
            request_interval_ms: 5_000,
        }
    }
}

impl RelayConfig {
    /// Load from `RELAY_CONFIG` (if set), apply environment overrides and
    /// validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("RELAY_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded relay configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides looked up through `lookup` (the environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("RELAY_SNAPSHOT_PATH") {
            self.storage.snapshot_path = PathBuf::from(path);
        }
        if let Some(v) = lookup("RELAY_ORACLE_START_INDEX") {
            self.registry.oracle_start_index = parse_value("RELAY_ORACLE_START_INDEX", &v)?;
        }
        if let Some(v) = lookup("RELAY_ORACLE_COUNT") {
            self.registry.oracle_count = parse_value("RELAY_ORACLE_COUNT", &v)?;
        }
        if let Some(v) = lookup("RELAY_HALT_POLICY") {
            self.dispatch.halt_policy = parse_value("RELAY_HALT_POLICY", &v)?;
        }
        if let Some(v) = lookup("RELAY_MAX_IN_FLIGHT") {
            self.dispatch.max_in_flight = Some(parse_value("RELAY_MAX_IN_FLIGHT", &v)?);
        }
        if let Some(v) = lookup("RELAY_EVENT_CAPACITY") {
            self.dispatch.event_capacity = parse_value("RELAY_EVENT_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("RELAY_REQUEST_INTERVAL_MS") {
            self.simulation.request_interval_ms = parse_value("RELAY_REQUEST_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("RELAY_SIMULATION_SEED") {
            self.simulation.seed = Some(parse_value("RELAY_SIMULATION_SEED", &v)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.oracle_count == 0 {
            return Err(invalid("registry.oracle_count", "must be at least 1"));
        }
        if self.registry.index_bound < 3 {
            return Err(invalid(
                "registry.index_bound",
                "must leave room for 3 distinct indices",
            ));
        }
        if self.dispatch.event_capacity == 0 {
            return Err(invalid("dispatch.event_capacity", "must be at least 1"));
        }
        if self.dispatch.max_in_flight == Some(0) {
            return Err(invalid("dispatch.max_in_flight", "must be at least 1"));
        }
        if self.storage.snapshot_path.as_os_str().is_empty() {
            return Err(invalid("storage.snapshot_path", "must not be empty"));
        }
        let needed = self
            .registry
            .oracle_start_index
            .checked_add(self.registry.oracle_count)
            .ok_or_else(|| {
                invalid("registry.oracle_count", "start index plus count overflows")
            })?;
        if self.simulation.account_count < needed {
            warn!(
                "Simulated registry has {} accounts but oracles need {}",
                self.simulation.account_count, needed
            );
        }
        if self.simulation.min_responses == 0 {
            return Err(invalid("simulation.min_responses", "must be at least 1"));
        }
        Ok(())
    }

    /// Settings for the simulated registry derived from this config.
    pub fn simulated_registry(&self) -> SimulatedRegistryConfig {
        SimulatedRegistryConfig {
            account_count: self.simulation.account_count,
            index_bound: self.registry.index_bound,
            min_responses: self.simulation.min_responses,
            registration_fee: DEFAULT_REGISTRATION_FEE,
            event_capacity: self.dispatch.event_capacity,
            seed: self.simulation.seed,
        }
    }
}

fn parse_value<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        field,
        reason: format!("{:?}: {}", raw, e),
    })
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.registry.oracle_start_index, 10);
        assert_eq!(config.registry.oracle_count, 30);
        assert_eq!(config.registry.index_bound, 10);
        assert_eq!(config.dispatch.halt_policy, HaltPolicy::Global);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("RELAY_ORACLE_COUNT", "5"),
            ("RELAY_HALT_POLICY", "per-subject"),
            ("RELAY_MAX_IN_FLIGHT", "4"),
            ("RELAY_SNAPSHOT_PATH", "/tmp/relay/oracles.json"),
        ]
        .into_iter()
        .collect();

        let mut config = RelayConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.registry.oracle_count, 5);
        assert_eq!(config.dispatch.halt_policy, HaltPolicy::PerSubject);
        assert_eq!(config.dispatch.max_in_flight, Some(4));
        assert_eq!(
            config.storage.snapshot_path,
            PathBuf::from("/tmp/relay/oracles.json")
        );
    }

    #[test]
    fn test_bad_override_is_reported() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_overrides(|k| (k == "RELAY_ORACLE_COUNT").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "RELAY_ORACLE_COUNT",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = RelayConfig::default();
        config.registry.oracle_count = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.dispatch.max_in_flight = Some(0);
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.registry.index_bound = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overflowing_oracle_range_rejected() {
        let mut config = RelayConfig::default();
        config
            .apply_overrides(|key| match key {
                "RELAY_ORACLE_START_INDEX" => Some(usize::MAX.to_string()),
                _ => None,
            })
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "registry.oracle_count",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("relay.json");
        std::fs::write(
            &path,
            r#"{ "registry": { "oracle_count": 12 }, "dispatch": { "halt_policy": "per-subject" } }"#,
        )
        .unwrap();

        let config = RelayConfig::from_file(&path).unwrap();
        assert_eq!(config.registry.oracle_count, 12);
        assert_eq!(config.registry.oracle_start_index, 10);
        assert_eq!(config.dispatch.halt_policy, HaltPolicy::PerSubject);
        assert_eq!(config.dispatch.event_capacity, 256);
    }

    #[test]
    fn test_unparsable_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("relay.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RelayConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            RelayConfig::from_file(temp_dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
