//! Disk tier: one JSON document per run in a lazily-created temp directory.

use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::TempDir;

use super::{RunResult, Store, StoreError};

/// Writes each [`RunResult`] as `<id>.json` to a process-scoped temp
/// directory. The directory is created on first save and removed when
/// the store is dropped.
#[derive(Debug, Default)]
pub struct DiskStore {
    dir: Mutex<Option<TempDir>>,
}

impl DiskStore {
    pub fn new() -> Self {
        DiskStore::default()
    }

    fn ensure_dir(&self) -> Result<PathBuf, StoreError> {
        let mut guard = self.dir.lock().expect("disk store mutex poisoned");
        if let Some(dir) = guard.as_ref() {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new()
            .prefix("vordr-runs-")
            .tempdir()
            .map_err(StoreError::CreateDir)?;
        let path = dir.path().to_path_buf();
        *guard = Some(dir);
        Ok(path)
    }
}

impl Store for DiskStore {
    fn save(&self, result: &RunResult) -> Result<(), StoreError> {
        let dir = self.ensure_dir()?;
        let data = serde_json::to_vec(result).map_err(|source| StoreError::Encode {
            id: result.id.clone(),
            source,
        })?;
        let path = dir.join(format!("{}.json", result.id));
        std::fs::write(&path, data).map_err(|source| StoreError::Write {
            id: result.id.clone(),
            source,
        })
    }

    fn load(&self, run_id: &str) -> Result<RunResult, StoreError> {
        let dir = self.ensure_dir()?;
        let path = dir.join(format!("{run_id}.json"));
        let data = std::fs::read(&path).map_err(|source| StoreError::Read {
            id: run_id.to_string(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| StoreError::Decode {
            id: run_id.to_string(),
            source,
        })
    }
}
