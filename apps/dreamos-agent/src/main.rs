//! # Dream OS Agent
//!
//! Headless runner and diagnostics tool for the offline sync layer.
//!
//! ## Commands
//! ```text
//! dreamos-agent [run]              run until Ctrl+C (drain on reconnect)
//! dreamos-agent status             health report + sync status (JSON)
//! dreamos-agent queue              pending mutations (JSON)
//! dreamos-agent sync-now           one drain pass
//! dreamos-agent offline on|off     forced-offline override
//! dreamos-agent export <file>      backup document (.json) or bookings (.csv)
//! dreamos-agent import <file> --yes
//! dreamos-agent purge --yes        delete all local data
//! ```
//!
//! Configuration comes from `dreamos.toml` in the platform config dir,
//! overridden by `DREAMOS_*` environment variables.

use anyhow::{bail, Context};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dreamos_db::{Database, DbConfig};
use dreamos_sync::{SyncAgent, SyncAgentBuilder, SyncConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("run");
    let rest = args.get(1..).unwrap_or_default();

    let config = SyncConfig::load_or_default(None);
    let mut agent = open_agent(config).await?;

    match command {
        "run" => run(&mut agent).await?,
        "status" => {
            let report = serde_json::json!({
                "health": agent.health_report().await,
                "sync": agent.status().await,
                "tenant": agent.state().tenant().await.id,
                "own_bookings": agent.state().own_booking_ids().await,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "queue" => {
            let pending = agent.queue().peek_all().await;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        "sync-now" => {
            let outcome = agent.sync_now().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        "offline" => {
            let flag = match rest.first().map(String::as_str) {
                Some("on") => true,
                Some("off") => false,
                _ => bail!("usage: dreamos-agent offline on|off"),
            };
            agent.set_forced_offline(flag).await;
            println!("forced offline: {}", flag);
        }
        "export" => {
            let path = rest.first().context("usage: dreamos-agent export <file>")?;
            export(&agent, Path::new(path)).await?;
        }
        "import" => {
            let path = rest.first().context("usage: dreamos-agent import <file> --yes")?;
            confirm(rest, "import replaces the loaded collections")?;
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path))?;
            agent.import_backup(&text).await?;
            println!("imported {}", path);
        }
        "purge" => {
            confirm(rest, "purge deletes every cached collection and queued mutation")?;
            agent.purge().await?;
            println!("local data purged");
        }
        other => bail!("unknown command: {}", other),
    }

    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=dreamos=trace` - Show trace for dreamos crates only
/// - Default: INFO, debug for dreamos
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dreamos=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_agent(config: SyncConfig) -> anyhow::Result<SyncAgent> {
    let path = config.database_path();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut db_config = DbConfig::new(&path);
    if let Some(quota) = config.storage.quota_bytes {
        db_config = db_config.quota_bytes(quota);
    }
    let db = Database::new(db_config)
        .await
        .with_context(|| format!("opening {}", path.display()))?;

    let agent = SyncAgentBuilder::new(config)
        .with_backend(Arc::new(db))
        .build()
        .await?;
    Ok(agent)
}

async fn run(agent: &mut SyncAgent) -> anyhow::Result<()> {
    let summary = agent.refresh().await;
    if summary.skipped {
        warn!("Tenant not configured; running with cached data only");
    }

    info!(greeting = %agent.router().welcome_message().await, "Agent ready");

    let handle = agent.start().await?;
    if agent.oracle().is_online() && !agent.queue().is_empty().await {
        let outcome = handle.sync_now().await?;
        info!(?outcome, "Startup drain");
    }

    shutdown_signal().await;
    handle.shutdown().await;
    info!("Agent stopped");
    Ok(())
}

async fn export(agent: &SyncAgent, path: &Path) -> anyhow::Result<()> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let contents = if is_csv {
        agent.export_bookings_csv().await
    } else {
        agent.export_backup().await.to_pretty_json()?
    };
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("exported {}", path.display());
    Ok(())
}

/// Destructive commands need an explicit `--yes`.
fn confirm(args: &[String], what: &str) -> anyhow::Result<()> {
    if args.iter().any(|a| a == "--yes" || a == "-y") {
        Ok(())
    } else {
        bail!("{}; re-run with --yes to confirm", what)
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping agent...");
}
