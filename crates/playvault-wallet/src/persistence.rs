//! Wallet row storage backends.
//!
//! ## Storage Layout
//!
//! [`JsonFilePersistence`] keeps one JSON file per owner:
//! ```text
//! {root}/wallets/{hex(owner_id)}.json
//! ```
//! Owner ids are hex-encoded so arbitrary ids map to safe file names.
//! Writes go to a temp file first and are renamed into place.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use playvault_core::error::PersistenceError;
use playvault_core::traits::WalletPersistence;
use playvault_core::types::{OwnerId, WalletRecord};

/// Process-local storage, used by tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    rows: RwLock<HashMap<OwnerId, WalletRecord>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl WalletPersistence for MemoryPersistence {
    fn load(&self, owner: &OwnerId) -> Result<Option<WalletRecord>, PersistenceError> {
        Ok(self.rows.read().get(owner).cloned())
    }

    fn save(&self, record: &WalletRecord) -> Result<(), PersistenceError> {
        self.rows
            .write()
            .insert(record.owner_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, owner: &OwnerId) -> Result<bool, PersistenceError> {
        Ok(self.rows.write().remove(owner).is_some())
    }
}

/// One JSON file per owner under `{root}/wallets`.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    root: PathBuf,
}

impl JsonFilePersistence {
    /// Open (and create if needed) the storage directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("wallets")).map_err(io_error)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, owner: &OwnerId) -> PathBuf {
        self.root
            .join("wallets")
            .join(format!("{}.json", hex::encode(owner.as_str())))
    }
}

fn io_error(e: io::Error) -> PersistenceError {
    PersistenceError::Io(e.to_string())
}

impl WalletPersistence for JsonFilePersistence {
    fn load(&self, owner: &OwnerId) -> Result<Option<WalletRecord>, PersistenceError> {
        let path = self.record_path(owner);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e)),
        };
        let record: WalletRecord = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            PersistenceError::Corrupted {
                owner: owner.to_string(),
                reason: e.to_string(),
            }
        })?;
        if &record.owner_id != owner {
            return Err(PersistenceError::Corrupted {
                owner: owner.to_string(),
                reason: format!("file holds record for {}", record.owner_id),
            });
        }
        Ok(Some(record))
    }

    fn save(&self, record: &WalletRecord) -> Result<(), PersistenceError> {
        let path = self.record_path(&record.owner_id);
        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path).map_err(io_error)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, record)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            writer.flush().map_err(io_error)?;
        }
        fs::rename(&temp_path, &path).map_err(io_error)?;
        debug!(owner = %record.owner_id, "wallet record written");
        Ok(())
    }

    fn delete(&self, owner: &OwnerId) -> Result<bool, PersistenceError> {
        match fs::remove_file(self.record_path(owner)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(e)),
        }
    }
}
