//! pglens CLI
//!
//! Point a superuser session at a running PostgreSQL instance and stream its
//! executed statements live, without touching the log files on disk.
//!
//! Usage:
//! ```bash
//! # Stream statements from a server
//! pglens watch --host db1 --database shop --username postgres
//!
//! # Only slow statements containing "orders"
//! pglens watch --host db1 --database shop --username postgres \
//!     --search orders --min-duration 50
//!
//! # Restore logging settings after a crash
//! pglens cleanup --host db1 --database shop --username postgres
//!
//! # Find instances on the local subnet
//! pglens scan
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use pglens_core::FilterCriteria;
use pglens_discovery::DiscoveryEngine;
use pglens_history::{ConnectionEntry, CredentialStore, HistoryStore};
use pglens_postgres::settings::{
    CollectorState, RestartPoll, await_restart, collector_enabled, enable_collector,
};
use pglens_postgres::{ConnectOptions, PoolConfig, cleanup, gate};
use pglens_stream::POLL_INTERVAL;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pglens")]
#[command(about = "Live PostgreSQL query-log streaming", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct ConnectArgs {
    /// Database host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Database port
    #[arg(long, default_value = "5432")]
    port: u16,

    /// Database name
    #[arg(long)]
    database: String,

    /// Superuser username
    #[arg(long, default_value = "postgres")]
    username: String,

    /// Password (falls back to the credential store, then to a prompt)
    #[arg(long, env = "PGLENS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream executed statements from a server
    Watch {
        #[command(flatten)]
        connect: ConnectArgs,

        /// Only show entries matching this substring (sql, user, or database)
        #[arg(long, default_value = "")]
        search: String,

        /// Only show entries at least this slow, in milliseconds
        #[arg(long, default_value = "0")]
        min_duration: f64,
    },
    /// Reset the logging settings out-of-band (after a crash)
    Cleanup {
        #[command(flatten)]
        connect: ConnectArgs,
    },
    /// Scan a /24 subnet for listening PostgreSQL instances
    Scan {
        /// Base subnet, e.g. 192.168.1 (auto-detected when omitted)
        #[arg(long)]
        subnet: Option<String>,

        /// First port to probe
        #[arg(long, default_value = "5432")]
        port_start: u16,

        /// One past the last port to probe
        #[arg(long, default_value = "5436")]
        port_end: u16,
    },
    /// Show or edit the connection history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List remembered connections, most recent first
    List,
    /// Forget one connection
    Remove {
        #[arg(long)]
        host: String,
        #[arg(long)]
        database: String,
        #[arg(long)]
        username: String,
    },
    /// Forget all connections
    Clear,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Resolve the password: flag/env, then credential store, then prompt.
fn resolve_password(args: &ConnectArgs) -> anyhow::Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }

    let account =
        CredentialStore::account_key(&args.username, &args.host, args.port, &args.database);
    if let Ok(store) = CredentialStore::default_location() {
        if let Some(password) = store.get(&account) {
            tracing::info!("Using stored credential for {}", account);
            return Ok(password);
        }
    }

    rpassword::prompt_password(format!("Password for {}: ", account))
        .context("Failed to read password")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Watch {
            connect,
            search,
            min_duration,
        } => {
            let criteria = FilterCriteria {
                search,
                min_duration_ms: min_duration,
            };
            run_watch(connect, criteria).await
        }
        Commands::Cleanup { connect } => run_cleanup(connect).await,
        Commands::Scan {
            subnet,
            port_start,
            port_end,
        } => run_scan(subnet, port_start, port_end).await,
        Commands::History { action } => run_history(action),
    }
}

async fn run_watch(args: ConnectArgs, criteria: FilterCriteria) -> anyhow::Result<()> {
    let opts = ConnectOptions::new(&args.host, args.port, &args.database, &args.username);
    let password = resolve_password(&args)?;

    let mut session = gate::connect(&opts, &password, PoolConfig::default()).await?;

    if !collector_enabled(&session.pool).await? {
        let mut state = CollectorState::Disabled;
        tracing::info!("logging_collector is off (state: {:?})", state);

        state = CollectorState::Enabling;
        tracing::debug!("collector state: {:?}", state);
        enable_collector(&session.pool).await?;

        state = CollectorState::AwaitingRestart;
        tracing::debug!("collector state: {:?}", state);
        println!("logging_collector has been enabled, but requires a server restart.");
        println!("Restart PostgreSQL now; waiting up to 10 minutes for it to come back...");

        match await_restart(&session.pool, &RestartPoll::default()).await {
            Ok(pid) => {
                state = CollectorState::Active;
                tracing::debug!("collector state: {:?}", state);
                session.backend_pid = pid;
                println!("Restart detected; continuing.");
            }
            Err(e) => {
                state = CollectorState::TimedOut;
                tracing::debug!("collector state: {:?}", state);
                return Err(e.into());
            }
        }
    }

    record_history(&opts);

    let handle = pglens_stream::start(&session).await?;
    println!("{}  (ctrl-c to stop)", handle.status().await);

    let mut seen = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                let (batch, watermark) = handle.events_since(seen).await;
                seen = watermark;
                for event in batch.iter().filter(|e| criteria.matches(e)) {
                    print_event(event);
                }
            }
        }
    }

    println!("Stopping stream and restoring settings...");
    handle.shutdown().await;
    session.pool.close().await;
    println!("Done.");
    Ok(())
}

fn print_event(event: &pglens_core::QueryEvent) {
    let duration = event
        .duration_ms
        .map(|d| format!(" ({:.1} ms)", d))
        .unwrap_or_default();
    println!(
        "{} [{}] {}@{}{}  {}",
        event.timestamp, event.pid, event.user, event.database, duration, event.sql
    );
}

fn record_history(opts: &ConnectOptions) {
    let entry = ConnectionEntry {
        host: opts.host.clone(),
        port: opts.port,
        database: opts.database.clone(),
        username: opts.username.clone(),
    };
    match HistoryStore::default_location() {
        Ok(store) => {
            if let Err(e) = store.add(entry) {
                tracing::warn!("Failed to record connection history: {}", e);
            }
        }
        Err(e) => tracing::warn!("History store unavailable: {}", e),
    }
}

async fn run_cleanup(args: ConnectArgs) -> anyhow::Result<()> {
    let opts = ConnectOptions::new(&args.host, args.port, &args.database, &args.username);
    let password = resolve_password(&args)?;

    println!("Resetting logging configuration on {}...", opts.display());
    cleanup::reset_logging_config(&opts, &password).await?;
    println!("Cleanup completed.");
    println!("Note: restart PostgreSQL if logging_collector was changed.");
    Ok(())
}

async fn run_scan(subnet: Option<String>, port_start: u16, port_end: u16) -> anyhow::Result<()> {
    anyhow::ensure!(port_start < port_end, "port range is empty");

    let base = subnet.unwrap_or_else(DiscoveryEngine::local_subnet);
    println!(
        "Scanning {}.0/24 on ports {}-{}...",
        base,
        port_start,
        port_end - 1
    );

    let engine = DiscoveryEngine::default();
    let mut found = engine.scan_subnet(&base, port_start..port_end).await;
    found.sort_by(|a, b| a.host.cmp(&b.host).then(a.port.cmp(&b.port)));

    for instance in &found {
        println!(
            "{}:{}  ({:.1} ms)",
            instance.host, instance.port, instance.response_time_ms
        );
    }
    println!("Scan complete. Found {} instance(s).", found.len());
    Ok(())
}

fn run_history(action: HistoryAction) -> anyhow::Result<()> {
    let store = HistoryStore::default_location()?;
    match action {
        HistoryAction::List => {
            let connections = store.load();
            if connections.is_empty() {
                println!("No remembered connections.");
            }
            for conn in connections {
                println!(
                    "{}@{}:{}/{}",
                    conn.username, conn.host, conn.port, conn.database
                );
            }
        }
        HistoryAction::Remove {
            host,
            database,
            username,
        } => {
            if store.remove(&host, &database, &username)? {
                println!("Removed.");
            } else {
                println!("No matching entry.");
            }
        }
        HistoryAction::Clear => {
            store.clear()?;
            println!("History cleared.");
        }
    }
    Ok(())
}
