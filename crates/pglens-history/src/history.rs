//! Connection history persistence
//!
//! CRUD over `connections.json`. Entries are kept most-recently-used first,
//! deduplicated on (host, port, database, username), and capped at
//! [`MAX_HISTORY`]. Passwords are never written here.

use pglens_core::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum number of remembered connections.
pub const MAX_HISTORY: usize = 20;

/// One remembered connection. No password field by design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    connections: Vec<ConnectionEntry>,
}

/// File-backed store for the connection history.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user config directory (`~/.config/pglens/connections.json`).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config_dir()?.join("connections.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the history. A missing or unreadable file yields an empty list.
    pub fn load(&self) -> Vec<ConnectionEntry> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<HistoryFile>(&raw) {
                Ok(file) => file.connections,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt history file {:?}: {}", self.path, e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }

    fn save(&self, connections: Vec<ConnectionEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = HistoryFile { connections };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Record a connection, moving duplicates to the front and enforcing the cap.
    pub fn add(&self, entry: ConnectionEntry) -> Result<()> {
        let mut connections = self.load();
        connections.retain(|c| c != &entry);
        connections.insert(0, entry);
        connections.truncate(MAX_HISTORY);
        self.save(connections)
    }

    /// Remove a connection. Returns true if an entry was removed.
    pub fn remove(&self, host: &str, database: &str, username: &str) -> Result<bool> {
        let mut connections = self.load();
        let before = connections.len();
        connections
            .retain(|c| !(c.host == host && c.database == database && c.username == username));
        let removed = connections.len() != before;
        if removed {
            self.save(connections)?;
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        self.save(Vec::new())
    }
}

pub(crate) fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("pglens"))
        .ok_or_else(|| pglens_core::Error::Config("No user config directory found".to_string()))
}
