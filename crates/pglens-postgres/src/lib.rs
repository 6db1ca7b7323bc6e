//! PostgreSQL access layer for pglens
//!
//! Everything that talks to the watched server lives here:
//! - [`gate`]: privileged connection setup and the superuser check
//! - [`settings`]: the statement-logging toggle, collector enablement, and
//!   restart polling
//! - [`logs`]: log directory listing, tailing, and rotation detection
//! - [`cleanup`]: out-of-band reset of the logging settings

pub mod cleanup;
pub mod config;
pub mod gate;
pub mod logs;
pub mod settings;

pub use config::{ConnectOptions, PoolConfig};
pub use sqlx::PgPool;
pub use gate::{WatchSession, connect};
pub use logs::{LogTailer, MAX_READ_BYTES, StreamCursor, latest_log_file};
pub use settings::{
    CollectorState, RestartPoll, await_restart, collector_enabled, current_setting,
    disable_statement_logging, enable_collector, enable_statement_logging,
};
