//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     tls.rs (PEM certificate + key for the HTTPS listener)
//!
//! Outbound:
//!     transport.rs (pooled client, one per process)
//!         → connector.rs (dial, TLS handshake, proxy tunnel)
//!             → env_proxy.rs (HTTP_PROXY / HTTPS_PROXY / NO_PROXY)
//!             → prebuffered.rs (bytes read past the CONNECT reply)
//! ```
//!
//! # Design Decisions
//! - Connections are pooled per scheme + authority and reused
//! - Dial and TLS handshake have separate deadlines
//! - Proxy settings are read once at startup

pub mod connector;
pub mod env_proxy;
pub mod prebuffered;
pub mod tls;
pub mod transport;

pub use env_proxy::EnvProxy;
pub use transport::{Transport, TransportError};
