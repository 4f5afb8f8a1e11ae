//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::security::Blacklist;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate the server configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = read_json(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the blacklist from a JSON array of host strings.
pub fn load_blacklist(path: &Path) -> Result<Blacklist, ConfigError> {
    let hosts: Vec<String> = read_json(path)?;
    Ok(Blacklist::new(hosts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static FILE_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn write_temp(contents: &str) -> PathBuf {
        let n = FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "relay-proxy-loader-{}-{}.json",
            std::process::id(),
            n
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_config_file() {
        let path = write_temp(r#"{"Host": "127.0.0.1", "Port": 8000, "Buffer": 512}"#);
        let config = load_config(&path).unwrap();

        assert_eq!(config.plain_address(), "127.0.0.1:8000");
        assert_eq!(config.buffer, 512);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("relay-proxy-does-not-exist.json");
        assert!(matches!(load_config(&path), Err(ConfigError::Io { .. })));
        assert!(matches!(load_blacklist(&path), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let path = write_temp("{ not json");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
        fs::remove_file(path).unwrap();

        let path = write_temp(r#"{"hosts": []}"#);
        assert!(matches!(load_blacklist(&path), Err(ConfigError::Parse { .. })));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn invalid_config_is_validation_error() {
        let path = write_temp(r#"{"Buffer": 0}"#);
        let err = load_config(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Validation(ref errors) if errors == &[ValidationError::ZeroBuffer]));
        assert!(err.to_string().contains("Buffer must be a positive byte count"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn blacklist_sorted_on_load() {
        let path = write_temp(r#"["c.example", "a.example", "b.example"]"#);
        let list = load_blacklist(&path).unwrap();

        assert_eq!(list.hosts(), &["a.example", "b.example", "c.example"]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn loading_twice_is_deterministic() {
        let config_path = write_temp(r#"{"Port": 8123, "Ssl": true, "Buffer": 64}"#);
        let list_path = write_temp(r#"["z", "y", "x", "y"]"#);

        assert_eq!(load_config(&config_path).unwrap(), load_config(&config_path).unwrap());
        assert_eq!(load_blacklist(&list_path).unwrap(), load_blacklist(&list_path).unwrap());

        fs::remove_file(config_path).unwrap();
        fs::remove_file(list_path).unwrap();
    }
}
