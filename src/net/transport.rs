//! Shared outbound transport.
//!
//! One pooled hyper-util client for the whole process. Connections are kept
//! per scheme + authority and reused across requests; the pool is internally
//! synchronised, so callers share a clone of [`Transport`] without locking.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::PROXY_AUTHORIZATION, uri::Scheme, Request, Uri, Version};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use thiserror::Error;

use crate::config::TransportConfig;
use crate::http::response::OutboundResponse;
use crate::net::connector::UpstreamConnector;
use crate::net::env_proxy::EnvProxy;

/// A failed round trip: connect, handshake, send, or awaiting headers.
#[derive(Debug, Error)]
#[error("round trip to {uri} failed: {}", error_chain(.source))]
pub struct TransportError {
    uri: String,
    #[source]
    source: hyper_util::client::legacy::Error,
}

impl TransportError {
    /// Target the request was sent to.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The connection could not be established (refused, DNS, timeout, TLS).
    pub fn is_connect(&self) -> bool {
        self.source.is_connect()
    }
}

/// Render an error and its causes as `outer: inner: root`.
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut cause = error.source();
    while let Some(err) = cause {
        rendered.push_str(": ");
        rendered.push_str(&err.to_string());
        cause = err.source();
    }
    rendered
}

/// Process-wide outbound HTTP client.
#[derive(Clone)]
pub struct Transport {
    client: Client<UpstreamConnector, Body>,
    proxies: Arc<EnvProxy>,
}

impl Transport {
    /// Build the transport, reading proxy settings from the environment when
    /// `use_env_proxy` is set.
    pub fn new(config: &TransportConfig) -> Self {
        let proxies = if config.use_env_proxy {
            let proxies = EnvProxy::from_env();
            tracing::info!(proxies = ?proxies, "Outbound requests honour environment proxies");
            proxies
        } else {
            EnvProxy::disabled()
        };
        Self::with_proxies(config, proxies)
    }

    pub fn with_proxies(config: &TransportConfig, proxies: EnvProxy) -> Self {
        let proxies = Arc::new(proxies);
        let connector = UpstreamConnector::new(config, proxies.clone());
        Self::with_connector(config, connector, proxies)
    }

    /// Build the transport around an existing connector. `proxies` must be
    /// the rules the connector routes with.
    pub fn with_connector(
        config: &TransportConfig,
        connector: UpstreamConnector,
        proxies: Arc<EnvProxy>,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_timer(TokioTimer::new())
            .build(connector);

        tracing::debug!(
            dial_timeout = ?config.dial_timeout(),
            keep_alive = ?config.keep_alive(),
            tls_handshake_timeout = ?config.tls_handshake_timeout(),
            "Transport initialised"
        );

        Self { client, proxies }
    }

    /// Send `request` to `target` and return once response headers arrive.
    ///
    /// The request is passed through as received; only its URI is replaced by
    /// the absolute `target` and the outbound protocol is HTTP/1.1. The
    /// response body stays open for the caller to stream.
    pub async fn forward(
        &self,
        request: Request<Body>,
        target: Uri,
    ) -> Result<OutboundResponse, TransportError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = target;
        parts.version = Version::HTTP_11;

        if parts.uri.scheme() == Some(&Scheme::HTTP) {
            if let Some(auth) = self
                .proxies
                .intercept(&parts.uri)
                .and_then(|proxy| proxy.basic_auth().cloned())
            {
                parts.headers.insert(PROXY_AUTHORIZATION, auth);
            }
        }

        let uri = parts.uri.to_string();
        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|source| TransportError { uri, source })?;

        Ok(OutboundResponse::from_upstream(response))
    }
}
