//! Oracle identities and the registered pool
//!
//! An oracle is an account handle plus the three request indices the
//! registry assigned to it at registration. Only requests carrying one of
//! those indices are answered by that oracle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Upper bound (exclusive) of the indices the registry hands out.
pub const INDEX_BOUND: u8 = 10;

/// Opaque reference to a registry account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OracleHandle(String);

impl OracleHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OracleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OracleHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Three distinct request indices assigned to one oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u8; 3]", into = "[u8; 3]")]
pub struct IndexTriple([u8; 3]);

impl IndexTriple {
    /// Build a triple, rejecting repeated indices.
    pub fn new(values: [u8; 3]) -> Result<Self, DomainError> {
        let [a, b, c] = values;
        if a == b || a == c || b == c {
            return Err(DomainError::InvalidTriple {
                values: values.to_vec(),
                reason: "indices must be distinct".to_string(),
            });
        }
        Ok(Self(values))
    }

    /// Build a triple whose indices must all be below `bound`.
    pub fn bounded(values: [u8; 3], bound: u8) -> Result<Self, DomainError> {
        let triple = Self::new(values)?;
        if !triple.within(bound) {
            return Err(DomainError::InvalidTriple {
                values: values.to_vec(),
                reason: format!("indices must be below {}", bound),
            });
        }
        Ok(triple)
    }

    pub fn contains(&self, index: u8) -> bool {
        self.0.contains(&index)
    }

    pub fn within(&self, bound: u8) -> bool {
        self.0.iter().all(|&i| i < bound)
    }

    pub fn values(&self) -> [u8; 3] {
        self.0
    }
}

impl TryFrom<[u8; 3]> for IndexTriple {
    type Error = DomainError;

    fn try_from(values: [u8; 3]) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<IndexTriple> for [u8; 3] {
    fn from(triple: IndexTriple) -> Self {
        triple.0
    }
}

impl fmt::Display for IndexTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "[{}, {}, {}]", a, b, c)
    }
}

/// A bootstrapped oracle: its account and its assigned indices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleIdentity {
    pub handle: OracleHandle,
    pub index_triple: IndexTriple,
}

impl OracleIdentity {
    pub fn new(handle: OracleHandle, index_triple: IndexTriple) -> Self {
        Self {
            handle,
            index_triple,
        }
    }

    /// Whether this oracle is expected to answer requests for `index`.
    pub fn serves(&self, index: u8) -> bool {
        self.index_triple.contains(index)
    }
}

/// Ordered set of bootstrapped oracles, unique by handle.
///
/// Serialized as a plain list; deserialization rejects duplicate handles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<OracleIdentity>", into = "Vec<OracleIdentity>")]
pub struct RegisteredOraclePool {
    oracles: Vec<OracleIdentity>,
}

impl RegisteredOraclePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an oracle, keeping insertion order.
    pub fn insert(&mut self, identity: OracleIdentity) -> Result<(), DomainError> {
        if self.contains(&identity.handle) {
            return Err(DomainError::DuplicateOracle(identity.handle));
        }
        self.oracles.push(identity);
        Ok(())
    }

    pub fn contains(&self, handle: &OracleHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: &OracleHandle) -> Option<&OracleIdentity> {
        self.oracles.iter().find(|o| &o.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OracleIdentity> {
        self.oracles.iter()
    }

    pub fn as_slice(&self) -> &[OracleIdentity] {
        &self.oracles
    }
}

impl TryFrom<Vec<OracleIdentity>> for RegisteredOraclePool {
    type Error = DomainError;

    fn try_from(oracles: Vec<OracleIdentity>) -> Result<Self, Self::Error> {
        let mut pool = Self::new();
        for identity in oracles {
            pool.insert(identity)?;
        }
        Ok(pool)
    }
}

impl From<RegisteredOraclePool> for Vec<OracleIdentity> {
    fn from(pool: RegisteredOraclePool) -> Self {
        pool.oracles
    }
}

impl<'a> IntoIterator for &'a RegisteredOraclePool {
    type Item = &'a OracleIdentity;
    type IntoIter = std::slice::Iter<'a, OracleIdentity>;

    fn into_iter(self) -> Self::IntoIter {
        self.oracles.iter()
    }
}
