//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the proxy. Field names
//! on disk are PascalCase (`Host`, `Port`, `SslPort`, ...), matching the
//! persisted `serv.json` format.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ServerConfig {
    /// Interface both listeners bind to (e.g., "0.0.0.0").
    pub host: String,

    /// Plaintext listener port.
    pub port: u16,

    /// Start the TLS listener as well.
    pub ssl: bool,

    /// TLS listener port.
    pub ssl_port: u16,

    /// Path to certificate file (PEM).
    pub cert: String,

    /// Path to private key file (PEM).
    pub key: String,

    /// Byte size of the buffer used to stream upstream bodies.
    pub buffer: usize,

    /// Outbound transport settings.
    pub transport: TransportConfig,

    /// What to do when the upstream round trip fails.
    pub upstream_failure: UpstreamFailurePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ssl: false,
            ssl_port: 8443,
            cert: "conf/cert.pem".to_string(),
            key: "conf/key.pem".to_string(),
            buffer: 4096,
            transport: TransportConfig::default(),
            upstream_failure: UpstreamFailurePolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Plaintext listen address, `host:port`.
    pub fn plain_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// TLS listen address, `host:ssl_port`.
    pub fn tls_address(&self) -> String {
        format!("{}:{}", self.host, self.ssl_port)
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TransportConfig {
    /// TCP connect timeout in seconds.
    pub dial_timeout_secs: u64,

    /// TCP keep-alive interval in seconds.
    pub keep_alive_secs: u64,

    /// TLS handshake timeout in seconds.
    pub tls_handshake_timeout_secs: u64,

    /// How long an idle pooled connection is kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per destination.
    pub pool_max_idle_per_host: usize,

    /// Honour HTTP_PROXY / HTTPS_PROXY / NO_PROXY.
    pub use_env_proxy: bool,

    /// Deadline for each read of an upstream body. No deadline when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_read_timeout_secs: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: 30,
            keep_alive_secs: 30,
            tls_handshake_timeout_secs: 10,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 2,
            use_env_proxy: true,
            body_read_timeout_secs: None,
        }
    }
}

impl TransportConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    pub fn body_read_timeout(&self) -> Option<Duration> {
        self.body_read_timeout_secs.map(Duration::from_secs)
    }
}

/// Behaviour of the relay handler when the upstream round trip fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum UpstreamFailurePolicy {
    /// Answer 502 Bad Gateway with an empty body.
    #[default]
    BadGateway,
    /// Abort handling of the request; the client connection is dropped
    /// without a response.
    Abort,
}
