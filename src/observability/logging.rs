//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Log each inbound request line and its headers
//! - Dump the effective configuration at startup
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via `RUST_LOG`, with a sensible default

use std::net::SocketAddr;

use axum::http::Request;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;
use crate::security::Blacklist;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "relay_proxy=info,tower_http=info";

/// Install the global subscriber. Call once, before anything logs.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Request line plus one event per header value.
pub fn log_request<B>(remote: SocketAddr, request: &Request<B>) {
    tracing::info!(
        remote = %remote,
        protocol = ?request.version(),
        method = %request.method(),
        url = %request.uri(),
        "Inbound request"
    );
    for (name, value) in request.headers() {
        tracing::info!(remote = %remote, header = %name, value = ?value, "Request header");
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

/// Log the effective server configuration and blacklist.
pub fn log_startup(config: &ServerConfig, blacklist: &Blacklist) {
    tracing::info!("Server config:\n{}", pretty(config));
    tracing::info!(entries = blacklist.len(), "Blacklist:\n{}", pretty(blacklist));
}
