//! reefd — the reef daemon.
//!
//! Runs the whole edge runtime in one process: the public `/live/…`
//! ingress, the control-plane REST API, the metadata store, and a
//! single-member cluster dispatcher executing runtime workers locally.
//!
//! # Usage
//!
//! ```text
//! reefd serve --config reef.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use reef_api::ApiState;
use reef_core::ReefConfig;
use reef_dispatch::{Dispatcher, LocalNode};
use reef_ingress::IngressState;
use reef_runtime::RuntimeHost;
use reef_state::MetadataStore;

#[derive(Parser)]
#[command(name = "reefd", about = "reef daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve ingress traffic and the control-plane API.
    Serve {
        /// Path to the TOML configuration file. Defaults are used if
        /// the file does not exist.
        #[arg(long, default_value = "reef.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reefd=debug,reef=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => serve(config).await,
    }
}

async fn serve(config_path: PathBuf) -> anyhow::Result<()> {
    let config = if config_path.exists() {
        ReefConfig::from_file(&config_path)?
    } else {
        info!(path = ?config_path, "config file not found, using defaults");
        ReefConfig::default()
    };

    info!("reef daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_path = config.storage.data_dir.join("reef.redb");
    let store = MetadataStore::open(&db_path)?;
    info!(path = ?db_path, "metadata store opened");

    let runtime = RuntimeHost::new(store.clone(), config.runtime.clone());
    info!(
        cache_entries = config.runtime.cache_max_entries,
        "wasm runtime initialized"
    );

    let dispatcher = Dispatcher::new();
    dispatcher.register_member(Arc::new(LocalNode::new(
        "member-1",
        runtime,
        dispatcher.response_channel(),
    )));
    info!(members = dispatcher.member_count(), "cluster dispatcher initialized");

    // ── Routers ────────────────────────────────────────────────

    let ingress_router = reef_ingress::build_router(IngressState {
        store: store.clone(),
        dispatcher,
        request_timeout: Duration::from_millis(config.ingress.request_timeout_ms),
    });
    let api_router = reef_api::build_router(ApiState {
        store,
        live_base: config.live_base_url(),
    });

    let ingress_listener = TcpListener::bind(&config.ingress.listen_addr).await?;
    let api_listener = TcpListener::bind(&config.api.listen_addr).await?;
    info!(addr = %config.ingress.listen_addr, "ingress listening");
    info!(addr = %config.api.listen_addr, "control-plane api listening");

    // ── Graceful shutdown on Ctrl-C ────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut ingress_shutdown = shutdown_rx.clone();
    let mut api_shutdown = shutdown_rx;
    let ingress_server = axum::serve(ingress_listener, ingress_router)
        .with_graceful_shutdown(async move {
            let _ = ingress_shutdown.changed().await;
        });
    let api_server = axum::serve(api_listener, api_router).with_graceful_shutdown(async move {
        let _ = api_shutdown.changed().await;
    });
    tokio::try_join!(
        async move { ingress_server.await },
        async move { api_server.await },
    )?;

    info!("reef daemon stopped");
    Ok(())
}
