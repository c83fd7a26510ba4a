//! Durable on-device persistence of the latest archive revision.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::models::ArchiveState;
use crate::room::RoomId;

/// Namespaced key the archive is stored under.
pub const ARCHIVE_KEY: &str = "ich_archive_v4";

/// A revision the room has not acknowledged yet.
///
/// At most one is stored. It is replayed the next time the same room is
/// joined, so an edit whose push failed survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub room: RoomId,
    pub state: ArchiveState,
}

/// Storage for the latest archive revision.
///
/// Saves are synchronous and unconditional; callers treat failures as
/// non-fatal.
pub trait LocalStore: Send + Sync {
    fn save(&self, state: &ArchiveState) -> Result<(), StorageError>;

    /// Returns `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ArchiveState>, StorageError>;

    /// Replaces the stored pending write.
    fn save_pending(&self, pending: &PendingWrite) -> Result<(), StorageError>;

    fn load_pending(&self) -> Result<Option<PendingWrite>, StorageError>;

    /// Removes the pending write. Clearing an empty slot is not an error.
    fn clear_pending(&self) -> Result<(), StorageError>;
}

/// Stores the archive as a single JSON file in a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", ARCHIVE_KEY))
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn pending_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.pending.json", ARCHIVE_KEY))
    }
}

impl LocalStore for FileStore {
    fn save(&self, state: &ArchiveState) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::Io(self.data_dir.clone(), e))?;

        let json = state
            .canonical_json()
            .map_err(|e| StorageError::Serialize(e.to_string()))?;

        let path = self.path();
        fs::write(&path, json).map_err(|e| StorageError::Io(path, e))
    }

    fn load(&self) -> Result<Option<ArchiveState>, StorageError> {
        let path = self.path();

        match fs::read_to_string(&path) {
            Ok(json) => ArchiveState::from_json(&json)
                .map(Some)
                .map_err(|e| StorageError::Corrupt(path, e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(path, e)),
        }
    }

    fn save_pending(&self, pending: &PendingWrite) -> Result<(), StorageError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::Io(self.data_dir.clone(), e))?;

        let json =
            serde_json::to_string(pending).map_err(|e| StorageError::Serialize(e.to_string()))?;

        let path = self.pending_path();
        fs::write(&path, json).map_err(|e| StorageError::Io(path, e))
    }

    fn load_pending(&self) -> Result<Option<PendingWrite>, StorageError> {
        let path = self.pending_path();

        match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StorageError::Corrupt(path, e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(path, e)),
        }
    }

    fn clear_pending(&self) -> Result<(), StorageError> {
        let path = self.pending_path();

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(path, e)),
        }
    }
}

/// Keeps the serialized archive in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    json: Mutex<Option<String>>,
    pending: Mutex<Option<PendingWrite>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: &ArchiveState) -> Result<Self, StorageError> {
        let store = Self::new();
        store.save(state)?;
        *store.saves.lock().unwrap_or_else(|e| e.into_inner()) = 0;
        Ok(store)
    }

    /// Number of saves since construction.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocalStore for MemoryStore {
    fn save(&self, state: &ArchiveState) -> Result<(), StorageError> {
        let json = state
            .canonical_json()
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        *self.json.lock().unwrap_or_else(|e| e.into_inner()) = Some(json);
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<ArchiveState>, StorageError> {
        let json = self.json.lock().unwrap_or_else(|e| e.into_inner()).clone();
        json.map(|json| {
            ArchiveState::from_json(&json)
                .map_err(|e| StorageError::Corrupt(PathBuf::from(ARCHIVE_KEY), e.to_string()))
        })
        .transpose()
    }

    fn save_pending(&self, pending: &PendingWrite) -> Result<(), StorageError> {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = Some(pending.clone());
        Ok(())
    }

    fn load_pending(&self) -> Result<Option<PendingWrite>, StorageError> {
        Ok(self.pending.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn clear_pending(&self) -> Result<(), StorageError> {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Loads the stored archive, falling back to the seed archive when nothing
/// is stored or the stored copy cannot be read.
pub fn load_or_seed(store: &dyn LocalStore) -> ArchiveState {
    match store.load() {
        Ok(Some(state)) => state,
        Ok(None) => ArchiveState::seed(),
        Err(e) => {
            tracing::warn!("Local archive unreadable, starting from seed: {}", e);
            ArchiveState::seed()
        }
    }
}

/// Errors that can occur during local store operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error reading or writing a file.
    Io(PathBuf, io::Error),
    /// Stored content could not be parsed.
    Corrupt(PathBuf, String),
    /// The archive could not be serialized.
    Serialize(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(path, e) => write!(f, "I/O error for {}: {}", path.display(), e),
            StorageError::Corrupt(path, e) => {
                write!(f, "Failed to parse archive {}: {}", path.display(), e)
            }
            StorageError::Serialize(e) => write!(f, "Failed to serialize archive: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(_, e) => Some(e),
            StorageError::Corrupt(_, _) | StorageError::Serialize(_) => None,
        }
    }
}
