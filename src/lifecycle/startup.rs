//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the relay server from a validated config
//! - Bind the plaintext listener and, when enabled, the TLS listener
//! - Run both until the shutdown signal fires
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - TLS material is loaded before anything starts serving
//! - Either listener failing stops the process

use std::io;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ServerConfig, ValidationError};
use crate::http::RelayServer;
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::security::Blacklist;

/// Error type for bringing the proxy up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] io::Error),

    #[error("listener failed: {0}")]
    Serve(#[source] io::Error),
}

async fn bind(address: String) -> Result<TcpListener, StartupError> {
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}

/// Serve until `shutdown` fires or a listener fails.
pub async fn run(
    config: &ServerConfig,
    blacklist: Blacklist,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    let server = RelayServer::new(config, blacklist)?;

    let listener = bind(config.plain_address()).await?;

    let tls = if config.ssl {
        let tls_config = load_tls_config(Path::new(&config.cert), Path::new(&config.key))
            .await
            .map_err(StartupError::Tls)?;
        let tls_listener = bind(config.tls_address())
            .await?
            .into_std()
            .map_err(StartupError::Serve)?;
        Some((tls_listener, tls_config))
    } else {
        None
    };

    let plain = server.serve(listener, shutdown.subscribe());
    match tls {
        Some((tls_listener, tls_config)) => {
            let secure = server.serve_tls(tls_listener, tls_config, shutdown.subscribe());
            tokio::try_join!(plain, secure).map_err(StartupError::Serve)?;
        }
        None => plain.await.map_err(StartupError::Serve)?,
    }

    Ok(())
}
