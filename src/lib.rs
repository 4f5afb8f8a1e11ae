//! Forwarding HTTP/HTTPS proxy library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::ServerConfig;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
pub use security::Blacklist;
