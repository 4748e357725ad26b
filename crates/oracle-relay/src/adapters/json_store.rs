//! JSON file snapshot store
//!
//! Persists the pool as a pretty-printed JSON array next to an advisory
//! lock file. Writes go to a temp file that is synced and renamed over the
//! snapshot, so a crash leaves either the old or the new document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::domain::RegisteredOraclePool;
use crate::error::StoreError;
use crate::ports::RegistryStore;

/// File-backed [`RegistryStore`].
///
/// Holds an exclusive lock on `<snapshot>.lock` until dropped.
pub struct JsonFileRegistryStore {
    path: PathBuf,
    lock_file: File,
}

impl JsonFileRegistryStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Locked` if another process holds the snapshot.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;

        let lock_path = sibling(&path, "lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Io {
                path: lock_path.clone(),
                source,
            })?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked { path: path.clone() })?;

        info!("[store] Opened oracle snapshot at {}", path.display());
        Ok(Self { path, lock_file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for JsonFileRegistryStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}

impl RegistryStore for JsonFileRegistryStore {
    fn load(&self) -> Result<RegisteredOraclePool, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("[store] No snapshot at {}", self.path.display());
                return Ok(RegisteredOraclePool::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let pool: RegisteredOraclePool =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "[store] Loaded {} oracles from {}",
            pool.len(),
            self.path.display()
        );
        Ok(pool)
    }

    fn save(&self, pool: &RegisteredOraclePool) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(pool).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write atomically via temp file
        let temp_path = sibling(&self.path, "tmp");
        let mut file = File::create(&temp_path).map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;

        debug!(
            "[store] Saved {} oracles to {}",
            pool.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// `oracles.json` -> `oracles.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IndexTriple, OracleHandle, OracleIdentity};
    use tempfile::TempDir;

    fn sample_pool() -> RegisteredOraclePool {
        let mut pool = RegisteredOraclePool::new();
        for (handle, triple) in [("0xa1", [1, 4, 7]), ("0xb2", [2, 4, 9]), ("0xc3", [3, 5, 7])] {
            pool.insert(OracleIdentity::new(
                OracleHandle::new(handle),
                IndexTriple::new(triple).unwrap(),
            ))
            .unwrap();
        }
        pool
    }

    #[test]
    fn test_missing_snapshot_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileRegistryStore::open(temp_dir.path().join("oracles.json")).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/oracles.json");
        let store = JsonFileRegistryStore::open(&path).unwrap();

        let pool = sample_pool();
        store.save(&pool).unwrap();
        assert_eq!(store.load().unwrap(), pool);

        // No temp file left behind
        assert!(!sibling(&path, "tmp").exists());

        // Human-readable document
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"indexTriple\""));
        assert!(text.contains('\n'));
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oracles.json");
        {
            let store = JsonFileRegistryStore::open(&path).unwrap();
            store.save(&sample_pool()).unwrap();
        }
        let store = JsonFileRegistryStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), sample_pool());
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oracles.json");
        fs::write(&path, b"[{\"handle\": \"0xa1\", \"indexTr").unwrap();

        let store = JsonFileRegistryStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_invalid_triple_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oracles.json");
        fs::write(&path, r#"[{ "handle": "0xa1", "indexTriple": [4, 4, 7] }]"#).unwrap();

        let store = JsonFileRegistryStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_second_open_is_locked() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oracles.json");

        let first = JsonFileRegistryStore::open(&path).unwrap();
        assert!(matches!(
            JsonFileRegistryStore::open(&path),
            Err(StoreError::Locked { .. })
        ));

        drop(first);
        assert!(JsonFileRegistryStore::open(&path).is_ok());
    }
}
