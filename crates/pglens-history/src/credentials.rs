//! File-based credential storage
//!
//! Persists the password for a connection, keyed `user@host:port/database`,
//! under the user config directory with owner-only (0600) permissions on
//! Unix. Callers treat storage failure as non-fatal.

use pglens_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    accounts: BTreeMap<String, String>,
}

/// File-backed password store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user config directory (`~/.config/pglens/credentials.json`).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(
            crate::history::config_dir()?.join("credentials.json"),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Account key for a connection: `user@host:port/database`.
    pub fn account_key(username: &str, host: &str, port: u16, database: &str) -> String {
        format!("{}@{}:{}/{}", username, host, port, database)
    }

    fn load(&self) -> CredentialsFile {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Persist a password for an account key, creating the file if needed.
    pub fn store(&self, account: &str, password: &str) -> Result<()> {
        let mut file = self.load();
        file.accounts
            .insert(account.to_string(), password.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Look up a stored password.
    pub fn get(&self, account: &str) -> Option<String> {
        self.load().accounts.get(account).cloned()
    }

    /// Forget a stored password. Returns true if one existed.
    pub fn remove(&self, account: &str) -> Result<bool> {
        let mut file = self.load();
        let removed = file.accounts.remove(account).is_some();
        if removed {
            fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        }
        Ok(removed)
    }
}
