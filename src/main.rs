//! relay-proxy: forwarding HTTP/HTTPS proxy with a host blacklist.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌──────────────────────────────────────────────────┐
//!     ───────────────────┼─▶ listener (http / https)                         │
//!                        │        │                                          │
//!                        │        ▼                                          │
//!                        │   relay handler ──▶ blacklist ──▶ 418             │
//!                        │        │                                          │
//!                        │        ▼                                          │
//!                        │   transport (pooled, env proxy) ────────────────┼──▶ Origin
//!                        │        │                                          │
//!     Client Response    │        ▼                                          │
//!     ◀──────────────────┼── headers + cookies, status, stream copier ◀────┼─── Origin
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use relay_proxy::config::{load_blacklist, load_config};
use relay_proxy::lifecycle::{self, signals, Shutdown};
use relay_proxy::observability;

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Forwarding HTTP/HTTPS proxy with a host blacklist", long_about = None)]
struct Cli {
    /// Server configuration (JSON).
    #[arg(short, long, default_value = "conf/serv.json")]
    config: PathBuf,

    /// Blacklisted hosts (JSON array of strings).
    #[arg(short, long, default_value = "conf/black.json")]
    blacklist: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    observability::init_tracing();

    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config).inspect_err(|e| {
        tracing::error!(path = %cli.config.display(), error = %e, "Failed to load server config");
    })?;
    let blacklist = load_blacklist(&cli.blacklist).inspect_err(|e| {
        tracing::error!(path = %cli.blacklist.display(), error = %e, "Failed to load blacklist");
    })?;
    observability::log_startup(&config, &blacklist);

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    lifecycle::run(&config, blacklist, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
