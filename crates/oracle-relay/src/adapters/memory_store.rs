//! In-memory snapshot store for tests and throwaway runs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::RegisteredOraclePool;
use crate::error::StoreError;
use crate::ports::RegistryStore;

/// Volatile [`RegistryStore`].
#[derive(Default)]
pub struct InMemoryRegistryStore {
    pool: Mutex<RegisteredOraclePool>,
    corrupt: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_pool(pool: RegisteredOraclePool) -> Self {
        Self {
            pool: Mutex::new(pool),
            ..Self::default()
        }
    }

    /// Make every later `load` report a corrupt snapshot until the next save.
    pub fn mark_corrupt(&self) {
        self.corrupt.store(true, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RegisteredOraclePool {
        self.pool.lock().clone()
    }
}

impl RegistryStore for InMemoryRegistryStore {
    fn load(&self) -> Result<RegisteredOraclePool, StoreError> {
        if self.corrupt.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt {
                path: PathBuf::from(":memory:"),
                reason: "snapshot marked corrupt".to_string(),
            });
        }
        Ok(self.pool.lock().clone())
    }

    fn save(&self, pool: &RegisteredOraclePool) -> Result<(), StoreError> {
        *self.pool.lock() = pool.clone();
        self.corrupt.store(false, Ordering::SeqCst);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
