//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! main.rs
//!     → logging.rs (subscriber init, startup config dump)
//!
//! relay handler
//!     → logging.rs (request line + headers per request)
//!     → tower-http TraceLayer (per-request spans)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event for machine parsing
//! - Filter through `RUST_LOG`; default keeps request logs at info

pub mod logging;

pub use logging::{init_tracing, log_request, log_startup};
