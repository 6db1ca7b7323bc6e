//! Out-of-band configuration reset
//!
//! Disaster-recovery path for the clean-exit rule: when the watcher could
//! not run its own cleanup (crash, kill -9), an operator runs this against
//! the same server to reset the two dynamic settings. Idempotent: resetting
//! settings already at their defaults is a no-op.

use crate::config::ConnectOptions;
use pglens_core::{Error, Result};
use sqlx::postgres::PgConnection;
use sqlx::{ConnectOptions as _, Connection};

const RESET_STEPS: [&str; 3] = [
    "ALTER SYSTEM RESET log_min_duration_statement",
    "ALTER SYSTEM RESET log_line_prefix",
    "SELECT pg_reload_conf()",
];

/// Connect once, reset both statement-logging settings, and reload.
pub async fn reset_logging_config(opts: &ConnectOptions, password: &str) -> Result<()> {
    let mut conn: PgConnection = opts
        .pg_options(password)
        .connect()
        .await
        .map_err(|e| Error::Database(format!("Failed to connect to {}: {}", opts.display(), e)))?;

    for sql in RESET_STEPS {
        sqlx::raw_sql(sql)
            .execute(&mut conn)
            .await
            .map_err(|e| Error::Database(format!("{} failed: {}", sql, e)))?;
        tracing::info!("{}", sql);
    }

    conn.close()
        .await
        .map_err(|e| Error::Database(format!("Close failed: {}", e)))?;

    tracing::info!("Logging configuration reset for {}", opts.display());
    Ok(())
}
