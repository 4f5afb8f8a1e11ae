//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → blacklist.rs (refuse blocked hosts with 418)
//!     → Pass to transport
//! ```
//!
//! # Design Decisions
//! - Checked before any outbound connection is opened
//! - Exact host match; nothing is normalised

pub mod blacklist;

pub use blacklist::Blacklist;
