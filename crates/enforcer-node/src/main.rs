//! Enforcer Node - GitLab policy enforcement service.
//!
//! `serve` (the default) receives system hooks and runs the scheduler;
//! `enforce` runs one full scan and exits.

use anyhow::Context;
use clap::{Parser, Subcommand};
use enforcer_client::{GitLabApi, GitLabClient};
use enforcer_core::ExecutionContext;
use enforcer_node::observability::init_logging;
use enforcer_node::{create_router, Scheduler, Service, Settings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Enforcer Node - keeps GitLab groups and projects in line with policy
#[derive(Parser, Debug)]
#[command(name = "enforcer-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: enforcer.yaml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// HTTP listen address
    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Receive system hooks and run scheduled scans
    Serve,
    /// Run one full scan and print the report
    Enforce,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(level) = args.log_level {
        settings.logging.level = level;
    }
    if let Some(addr) = args.listen_addr {
        settings.server.listen_addr = addr;
    }

    init_logging(&settings.logging.level, settings.logging.format);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        server_url = %settings.gitlab.server_url,
        rules = settings.rules.len(),
        "Starting enforcer node"
    );

    let client = GitLabClient::new(settings.client_config()).context("creating GitLab client")?;
    let gitlab: Arc<dyn GitLabApi> = Arc::new(client);
    let service = Service::build(&settings, gitlab).context("building rules")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Enforce => {
            let report = service
                .enforcer
                .enforce_all(ExecutionContext::Command)
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.complete {
                anyhow::bail!("enforcement scan incomplete");
            }
            Ok(())
        }
        Command::Serve => serve(settings, service).await,
    }
}

async fn serve(settings: Settings, service: Service) -> anyhow::Result<()> {
    let scheduler = settings
        .scheduler
        .enabled
        .then(|| Scheduler::new(service.enforcer.clone(), &settings.scheduler).spawn());
    if scheduler.is_none() {
        tracing::info!("Scheduler disabled");
    }

    let app = create_router(service.app_state(&settings.enforcer.system_hook_token));
    let listener = tokio::net::TcpListener::bind(settings.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", settings.server.listen_addr))?;
    tracing::info!(addr = %settings.server.listen_addr, "Listening for system hooks");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    tracing::info!("Enforcer node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
