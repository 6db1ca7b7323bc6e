//! Error types for pglens Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "User '{0}' is not a superuser. Connect with a superuser account (e.g. 'postgres')."
    )]
    InsufficientPrivilege(String),

    #[error("No log files found in the server log directory")]
    NoLogFiles,

    #[error("Restart detection timed out after {attempts} attempts")]
    RestartTimeout { attempts: u32 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
