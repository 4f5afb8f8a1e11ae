//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, one fallback handler per listener)
//!     → relay.rs (log, blacklist check, forward)
//!     → request.rs (host and absolute target of the request)
//!     → hops.rs (loop detection, Via stamp)
//!     → [net::Transport round trip]
//!     → response.rs (split cookies, collect headers, commit status)
//!     → stream.rs (fixed-buffer body copy)
//!     → Send to client
//! ```

pub mod hops;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;

pub use response::{CookieDescriptor, OutboundResponse, ResponseSink};
pub use server::RelayServer;
pub use stream::{CopyError, StreamCopier};
