//! Connection history and credential persistence for pglens
//!
//! - [`HistoryStore`]: recent-connections file (`connections.json`), never
//!   containing passwords
//! - [`CredentialStore`]: passwords keyed by `user@host:port/database`,
//!   stored with owner-only file permissions

pub mod credentials;
pub mod history;

pub use credentials::CredentialStore;
pub use history::{ConnectionEntry, HistoryStore, MAX_HISTORY};
