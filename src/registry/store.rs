//! Persistence for server records.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::record::ServerRecord;
use crate::error::StoreError;

/// Where the registry keeps its records.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Vec<ServerRecord>, StoreError>;
    fn save(&self, records: &[ServerRecord]) -> Result<(), StoreError>;
}

/// Pretty JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `servers.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("servers.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, records: &[ServerRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_vec_pretty(records)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "Saved server records");
        Ok(())
    }
}

/// In-process store for tests and ephemeral panels.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ServerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ServerRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Vec<ServerRecord>, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, records: &[ServerRecord]) -> Result<(), StoreError> {
        *self.records.lock().unwrap_or_else(|e| e.into_inner()) = records.to_vec();
        Ok(())
    }
}
