/*! Persistence of node state.

Three records are kept:

- the identity of the node, written once at startup;
- the ring table, rewritten after every change of a neighbor;
- the current chat partner, written when a search resolves and cleared at
  startup.
*/

use std::fs;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ringchat_packet::identity::NodeIdentity;
use ringchat_packet::ring::RingTable;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// File name of the persisted ring table.
pub const RING_FILE: &str = "DHT.json";
/// File name of the persisted identity.
pub const IDENTITY_FILE: &str = "User.json";
/// File name of the persisted chat partner.
pub const PARTNER_FILE: &str = "messagingPartner.json";

/// Error that can happen when saving or loading state.
#[derive(Debug, Error)]
pub enum StateError {
    /// Failed to read or write a state file.
    #[error("State IO error for {:?}: {}", path, error)]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// IO error.
        error: IoError,
    },
    /// State file has invalid content.
    #[error("Invalid state record in {:?}: {}", path, error)]
    Record {
        /// Path of the file.
        path: PathBuf,
        /// JSON error.
        error: serde_json::Error,
    },
    /// In-memory store mutex was poisoned.
    #[error("State store lock is poisoned")]
    Poisoned,
}

/// Durable storage of node state.
pub trait Store: Send + Sync {
    /// Save ring table after a change.
    fn save_ring(&self, table: &RingTable) -> Result<(), StateError>;
    /// Load ring table saved before, if any.
    fn load_ring(&self) -> Result<Option<RingTable>, StateError>;
    /// Save identity of this node.
    fn save_identity(&self, node: &NodeIdentity) -> Result<(), StateError>;
    /// Save the current chat partner.
    fn save_partner(&self, node: &NodeIdentity) -> Result<(), StateError>;
    /// Load the current chat partner, if any.
    fn load_partner(&self) -> Result<Option<NodeIdentity>, StateError>;
    /// Forget the current chat partner.
    fn clear_partner(&self) -> Result<(), StateError>;
}

/// `Store` keeping JSON files in a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create store in `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<FileStore, StateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|error| StateError::Io { path: dir.clone(), error })?;
        Ok(FileStore { dir })
    }

    /// Directory the files are kept in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StateError> {
        let path = self.dir.join(name);
        let data = serde_json::to_vec(value)
            .map_err(|error| StateError::Record { path: path.clone(), error })?;
        fs::write(&path, data).map_err(|error| StateError::Io { path, error })
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StateError> {
        let path = self.dir.join(name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(StateError::Io { path, error }),
        };
        // a cleared partner file is empty
        if data.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|error| StateError::Record { path, error })
    }
}

impl Store for FileStore {
    fn save_ring(&self, table: &RingTable) -> Result<(), StateError> {
        self.write(RING_FILE, table)
    }

    fn load_ring(&self) -> Result<Option<RingTable>, StateError> {
        self.read(RING_FILE)
    }

    fn save_identity(&self, node: &NodeIdentity) -> Result<(), StateError> {
        self.write(IDENTITY_FILE, node)
    }

    fn save_partner(&self, node: &NodeIdentity) -> Result<(), StateError> {
        self.write(PARTNER_FILE, node)
    }

    fn load_partner(&self) -> Result<Option<NodeIdentity>, StateError> {
        self.read(PARTNER_FILE)
    }

    fn clear_partner(&self) -> Result<(), StateError> {
        let path = self.dir.join(PARTNER_FILE);
        fs::write(&path, b"").map_err(|error| StateError::Io { path, error })
    }
}

#[derive(Default)]
struct MemoryState {
    ring: Option<RingTable>,
    identity: Option<NodeIdentity>,
    partner: Option<NodeIdentity>,
    ring_saves: usize,
}

/// `Store` keeping everything in memory. Useful for tests and for nodes that
/// should leave no trace on disk.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Number of times the ring table was saved.
    pub fn ring_saves(&self) -> usize {
        self.state.lock().map(|state| state.ring_saves).unwrap_or_default()
    }

    /// Identity saved before, if any.
    pub fn identity(&self) -> Option<NodeIdentity> {
        self.state.lock().ok().and_then(|state| state.identity.clone())
    }
}

impl Store for MemoryStore {
    fn save_ring(&self, table: &RingTable) -> Result<(), StateError> {
        let mut state = self.state.lock().map_err(|_| StateError::Poisoned)?;
        state.ring = Some(table.clone());
        state.ring_saves += 1;
        Ok(())
    }

    fn load_ring(&self) -> Result<Option<RingTable>, StateError> {
        let state = self.state.lock().map_err(|_| StateError::Poisoned)?;
        Ok(state.ring.clone())
    }

    fn save_identity(&self, node: &NodeIdentity) -> Result<(), StateError> {
        let mut state = self.state.lock().map_err(|_| StateError::Poisoned)?;
        state.identity = Some(node.clone());
        Ok(())
    }

    fn save_partner(&self, node: &NodeIdentity) -> Result<(), StateError> {
        let mut state = self.state.lock().map_err(|_| StateError::Poisoned)?;
        state.partner = Some(node.clone());
        Ok(())
    }

    fn load_partner(&self) -> Result<Option<NodeIdentity>, StateError> {
        let state = self.state.lock().map_err(|_| StateError::Poisoned)?;
        Ok(state.partner.clone())
    }

    fn clear_partner(&self) -> Result<(), StateError> {
        let mut state = self.state.lock().map_err(|_| StateError::Poisoned)?;
        state.partner = None;
        Ok(())
    }
}
