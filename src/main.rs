//! meek HTTP helper
//!
//! Relays HTTPS requests for a local controller, one request per loopback
//! connection.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────────┐
//!                        │                  HELPER                        │
//!   Controller           │  ┌──────────┐   ┌────────────┐   ┌──────────┐  │
//!   (length + JSON) ─────┼─▶│   net    │──▶│ protocol   │──▶│  proxy   │  │
//!                        │  │ listener │   │ frame/json │   │ resolver │  │
//!                        │  └──────────┘   │ validation │   └────┬─────┘  │
//!                        │                 └────────────┘        │        │
//!                        │                                       ▼        │
//!   Controller           │  ┌──────────┐                  ┌───────────┐   │    Upstream
//!   (length + JSON) ◀────┼──│ response │◀─────────────────│ transport │◀──┼──▶ HTTPS server
//!                        │  │  frame   │                  │ (reqwest) │   │    (direct or
//!                        │  └──────────┘                  └───────────┘   │     via proxy)
//!                        │                                                │
//!                        │  config · observability · resilience · lifecycle
//!                        └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use clap::Parser;

use meek_http_helper::config::{self, watcher, ConfigWatcher, HelperConfig};
use meek_http_helper::lifecycle::{self, Shutdown};
use meek_http_helper::net::{HelperServer, Listener};
use meek_http_helper::observability::{logging, metrics};
use meek_http_helper::transport::ReqwestTransport;

#[derive(Parser)]
#[command(name = "meek-http-helper")]
#[command(about = "Loopback HTTPS relay for meek", long_about = None)]
struct Args {
    /// TOML configuration file; reloaded on change.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => HelperConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listener.bind_address = listen;
        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "meek-http-helper starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        read_ms = config.timeouts.read_ms,
        write_ms = config.timeouts.write_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let transport = Arc::new(ReqwestTransport::new(config.engine_settings())?);
    let settings = Arc::new(ArcSwap::from_pointee(config.connection_settings()));
    let listener = Listener::bind(&config.listener).await?;
    let local_addr = listener.local_addr()?;
    let server = HelperServer::new(listener, transport, settings.clone());

    // Keep the watcher alive for the lifetime of the process.
    let _watcher = match &args.config {
        Some(path) => {
            let (config_watcher, updates) = ConfigWatcher::new(path);
            let handle = config_watcher.run()?;
            tokio::spawn(watcher::apply_updates(config.clone(), updates, settings));
            Some(handle)
        }
        None => None,
    };

    lifecycle::announce_listen(&mut std::io::stdout().lock(), local_addr)?;

    let shutdown = Shutdown::new();
    let server_task = tokio::spawn(server.run(shutdown.subscribe()));

    lifecycle::wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
