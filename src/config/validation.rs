//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer > 0, ports valid, timeouts > 0)
//! - Check that TLS material is named when the TLS listener is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a [`ServerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Buffer must be a positive byte count")]
    ZeroBuffer,

    #[error("{field} must not be 0")]
    ZeroPort { field: &'static str },

    #[error("Port and SslPort are both {port}")]
    PortConflict { port: u16 },

    #[error("{field} must name a file when Ssl is enabled")]
    MissingTlsFile { field: &'static str },

    #[error("Transport.{field} must be greater than 0")]
    ZeroTimeout { field: &'static str },

    #[error("Host must not be empty")]
    EmptyHost,
}

/// Check a loaded configuration, collecting every problem.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.buffer == 0 {
        errors.push(ValidationError::ZeroBuffer);
    }
    if config.port == 0 {
        errors.push(ValidationError::ZeroPort { field: "Port" });
    }

    if config.ssl {
        if config.ssl_port == 0 {
            errors.push(ValidationError::ZeroPort { field: "SslPort" });
        } else if config.ssl_port == config.port {
            errors.push(ValidationError::PortConflict { port: config.port });
        }
        if config.cert.trim().is_empty() {
            errors.push(ValidationError::MissingTlsFile { field: "Cert" });
        }
        if config.key.trim().is_empty() {
            errors.push(ValidationError::MissingTlsFile { field: "Key" });
        }
    }

    let transport = &config.transport;
    let timeouts = [
        ("DialTimeoutSecs", Some(transport.dial_timeout_secs)),
        ("TlsHandshakeTimeoutSecs", Some(transport.tls_handshake_timeout_secs)),
        ("BodyReadTimeoutSecs", transport.body_read_timeout_secs),
    ];
    for (field, value) in timeouts {
        if value == Some(0) {
            errors.push(ValidationError::ZeroTimeout { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn zero_buffer_rejected() {
        let config = ServerConfig {
            buffer: 0,
            ..ServerConfig::default()
        };
        assert_eq!(validate_config(&config), Err(vec![ValidationError::ZeroBuffer]));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ServerConfig {
            buffer: 0,
            port: 0,
            ssl: true,
            ssl_port: 0,
            cert: String::new(),
            ..ServerConfig::default()
        };
        config.transport.dial_timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroBuffer,
                ValidationError::ZeroPort { field: "Port" },
                ValidationError::ZeroPort { field: "SslPort" },
                ValidationError::MissingTlsFile { field: "Cert" },
                ValidationError::ZeroTimeout { field: "DialTimeoutSecs" },
            ]
        );
    }

    #[test]
    fn tls_checks_skipped_when_disabled() {
        let config = ServerConfig {
            ssl: false,
            ssl_port: 0,
            cert: String::new(),
            key: String::new(),
            ..ServerConfig::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn colliding_ports_rejected() {
        let config = ServerConfig {
            ssl: true,
            port: 8080,
            ssl_port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::PortConflict { port: 8080 }])
        );
    }
}
