//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! serv.json
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!
//! black.json
//!     → loader.rs (parse, sort)
//!     → Blacklist (immutable)
//!
//! Both are shared via Arc with the relay handler and transport.
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_blacklist, load_config, ConfigError};
pub use schema::{ServerConfig, TransportConfig, UpstreamFailurePolicy};
pub use validation::ValidationError;
