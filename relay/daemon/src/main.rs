//! Relay Daemon - HTTP Front End for the Streaming Pipeline
//!
//! Serves the agent-relay endpoints over HTTP. Each request to
//! `/api/process-stream` runs the agent on its own task and streams progress
//! and the final answer back as server-sent events.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (0.0.0.0:8000, ./uploads, ./outputs)
//! relay-daemon
//!
//! # Custom address and config file
//! relay-daemon --bind 127.0.0.1:9000 --config /etc/agent-relay/relay.toml
//!
//! # Verbose logging
//! RUST_LOG=debug relay-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

mod error;
mod routes;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use relay_core::agent::build_system_prompt;
use relay_core::{
    load_config, load_config_from_path, ChatCompletionsAgent, ConfigOverrides, FileArea,
    FileStore,
};

use server::AppState;

/// Relay Daemon - streams agent progress and answers over HTTP
#[derive(Parser, Debug)]
#[command(name = "relay-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on
    #[arg(short = 'b', long, env = "RELAY_BIND", value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "RELAY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "RELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory for uploaded files
    #[arg(long, env = "RELAY_UPLOADS_DIR", value_name = "DIR")]
    uploads_dir: Option<PathBuf>,

    /// Directory for files produced by the agent
    #[arg(long, env = "RELAY_OUTPUTS_DIR", value_name = "DIR")]
    outputs_dir: Option<PathBuf>,

    /// Model name passed to the agent backend
    #[arg(short = 'm', long, env = "RELAY_AGENT_MODEL")]
    model: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(bind) = self.bind {
            overrides = overrides.with_bind(bind);
        }
        if let Some(dir) = &self.uploads_dir {
            overrides = overrides.with_uploads_dir(dir.clone());
        }
        if let Some(dir) = &self.outputs_dir {
            overrides = overrides.with_outputs_dir(dir.clone());
        }
        if let Some(model) = &self.model {
            overrides = overrides.with_model(model.clone());
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "relay_daemon={level},relay_core={level},tower_http={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Resolve when SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating shutdown"),
        () = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(&args.log_level);

    info!("Relay Daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    info!(
        source = ?config.source(),
        bind = %config.bind,
        model = %config.agent.model,
        "Configuration loaded"
    );
    if config.agent.api_key.is_none() {
        warn!("No agent API key configured; requests will be sent unauthenticated");
    }

    let store = FileStore::open(&config.storage, config.limits.clone())
        .await
        .context("Failed to prepare file directories")?;

    if config.agent.system_prompt.is_none() {
        config.agent.system_prompt = Some(build_system_prompt(
            store.dir(FileArea::Upload),
            store.dir(FileArea::Output),
        ));
    }

    let agent =
        ChatCompletionsAgent::from_config(&config.agent).context("Failed to create agent")?;
    let orchestrator = config.build_orchestrator(Arc::new(agent));
    let state = Arc::new(AppState::new(orchestrator, store, &config));

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    let result = server::serve(listener, state, shutdown_signal()).await;

    match result {
        Ok(()) => {
            info!("Relay daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}
