//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file without semantic checks.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::validate_config;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("httpception-{}-{}.toml", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_valid_file() {
        let path = write_temp(
            "valid",
            "[listener]\nbind_address = \"127.0.0.1:3333\"\n[upstream]\naddress = \"127.0.0.1:4444\"\n",
        );
        let config = read_config(&path).unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.upstream.address, "127.0.0.1:4444");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn validation_errors_are_joined() {
        let path = write_temp("invalid", "[listener]\nmax_connections = 0\n");
        let config = read_config(&path).unwrap();
        let err = ConfigError::Validation(validate_config(&config).unwrap_err());
        assert_eq!(
            err.to_string(),
            "Validation failed: listen address is required, upstream address is required, \
             listener.max_connections must be greater than zero"
        );
        let _ = fs::remove_file(path);
    }

    #[test]
    fn parse_errors_surface() {
        let path = write_temp("broken", "[listener\n");
        assert!(matches!(read_config(&path), Err(ConfigError::Parse(_))));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
