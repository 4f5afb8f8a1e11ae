//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the relay handler as fallback
//! - Wire up middleware (tracing)
//! - Serve plaintext and TLS listeners until shutdown
//!
//! # Design Decisions
//! - Every path and method lands in one fallback handler; there is no routing
//! - State is cheap to clone: the blacklist is behind `Arc` and the transport
//!   shares one connection pool between clones
//! - Each listener tags requests with its scheme and bound address so
//!   origin-form requests can be resolved and loops back into the listener
//!   refused

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{http::uri::Scheme, Extension, Router};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, UpstreamFailurePolicy, ValidationError};
use crate::http::hops::HopMarker;
use crate::http::relay::relay_handler;
use crate::http::stream::StreamCopier;
use crate::lifecycle::ShutdownSignal;
use crate::net::Transport;
use crate::security::Blacklist;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub blacklist: Arc<Blacklist>,
    pub transport: Transport,
    pub copier: StreamCopier,
    pub upstream_failure: UpstreamFailurePolicy,
    pub hop: HopMarker,
}

/// The listener that accepted a request.
#[derive(Debug, Clone)]
pub struct ListenerInfo {
    pub scheme: Scheme,
    pub local_addr: SocketAddr,
}

/// The forwarding proxy, ready to be bound to listeners.
#[derive(Clone)]
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Build the server with a transport configured from `config`.
    pub fn new(config: &ServerConfig, blacklist: Blacklist) -> Result<Self, ValidationError> {
        let transport = Transport::new(&config.transport);
        Self::with_transport(config, blacklist, transport)
    }

    pub fn with_transport(
        config: &ServerConfig,
        blacklist: Blacklist,
        transport: Transport,
    ) -> Result<Self, ValidationError> {
        let buffer = NonZeroUsize::new(config.buffer).ok_or(ValidationError::ZeroBuffer)?;
        let copier = StreamCopier::new(buffer).with_read_timeout(config.transport.body_read_timeout());

        Ok(Self {
            state: AppState {
                blacklist: Arc::new(blacklist),
                transport,
                copier,
                upstream_failure: config.upstream_failure,
                hop: HopMarker::new(),
            },
        })
    }

    /// Router for the listener bound at `local_addr`, serving `scheme`.
    pub fn router(&self, scheme: Scheme, local_addr: SocketAddr) -> Router {
        Router::new()
            .fallback(relay_handler)
            .with_state(self.state.clone())
            .layer(Extension(ListenerInfo { scheme, local_addr }))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve plaintext HTTP on `listener` until `shutdown` fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Start serving");

        let app = self
            .router(Scheme::HTTP, addr)
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!(address = %addr, "HTTP listener stopped");
        Ok(())
    }

    /// Serve HTTPS on an already bound `listener` until `shutdown` fires.
    pub async fn serve_tls(
        &self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        tracing::info!(address = %addr, "Start ssl serving");

        let handle = Handle::new();
        let signal = handle.clone();
        tokio::spawn(async move {
            shutdown.recv().await;
            signal.graceful_shutdown(None);
        });

        let app = self
            .router(Scheme::HTTPS, addr)
            .into_make_service_with_connect_info::<SocketAddr>();

        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!(address = %addr, "HTTPS listener stopped");
        Ok(())
    }
}
