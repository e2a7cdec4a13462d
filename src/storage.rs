use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::models::CertificateRecord;
use crate::utils::RenewalError;

/// Boundary to the collaborator that owns certificate records.
///
/// The engine reads the lookup fields and writes back status, attempt count
/// and error message; everything else about the records (creation, deletion,
/// scheduling) belongs to the collaborator. The queue guarantees at most one
/// concurrent invocation per record; this trait does not re-enforce that.
pub trait CertificateStore: Send + Sync {
    fn load(&self, id: u64) -> Result<CertificateRecord, RenewalError>;
    fn update(&self, record: &CertificateRecord) -> Result<(), RenewalError>;
}

/// Store backed by a single JSON file holding an array of records.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    fn read_all(&self) -> Result<Vec<CertificateRecord>, RenewalError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            RenewalError::Storage(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            RenewalError::Storage(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, records: &[CertificateRecord]) -> Result<(), RenewalError> {
        let raw = serde_json::to_string_pretty(records)
            .map_err(|e| RenewalError::Storage(format!("failed to serialize records: {}", e)))?;
        std::fs::write(&self.path, raw).map_err(|e| {
            RenewalError::Storage(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl CertificateStore for JsonFileStore {
    fn load(&self, id: u64) -> Result<CertificateRecord, RenewalError> {
        self.read_all()?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| RenewalError::Storage(format!("certificate record {} not found", id)))
    }

    fn update(&self, record: &CertificateRecord) -> Result<(), RenewalError> {
        let mut records = self.read_all()?;
        let slot = records
            .iter_mut()
            .find(|existing| existing.id == record.id)
            .ok_or_else(|| {
                RenewalError::Storage(format!("certificate record {} not found", record.id))
            })?;
        *slot = record.clone();
        self.write_all(&records)?;
        debug!("record {} saved with status {}", record.id, record.status);
        Ok(())
    }
}

/// Seeds a fresh store file. Existing files are left untouched.
pub fn init_store(path: &Path, records: &[CertificateRecord]) -> Result<(), RenewalError> {
    if path.exists() {
        return Err(RenewalError::Storage(format!(
            "{} already exists",
            path.display()
        )));
    }
    JsonFileStore::new(path).write_all(records)
}

/// In-memory store for tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<u64, CertificateRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: CertificateRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }
}

impl CertificateStore for MemoryStore {
    fn load(&self, id: u64) -> Result<CertificateRecord, RenewalError> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RenewalError::Storage(format!("certificate record {} not found", id)))
    }

    fn update(&self, record: &CertificateRecord) -> Result<(), RenewalError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }
}
