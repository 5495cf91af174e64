//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. All problems are reported
//! together rather than stopping at the first.

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listen address is required")]
    MissingListenAddress,

    #[error("upstream address is required")]
    MissingUpstreamAddress,

    #[error("control address is required")]
    MissingControlAddress,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: usize },

    #[error("unknown log format {0:?} (expected \"pretty\" or \"json\")")]
    LogFormat(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::MissingListenAddress);
    }
    if config.upstream.address.trim().is_empty() {
        errors.push(ValidationError::MissingUpstreamAddress);
    }
    if config.control.bind_address.trim().is_empty() {
        errors.push(ValidationError::MissingControlAddress);
    }

    let positive = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.response_timeout_secs", config.upstream.response_timeout_secs),
        ("control.session_queue", config.control.session_queue as u64),
        ("control.command_queue", config.control.command_queue as u64),
        ("limits.max_body_bytes", config.limits.max_body_bytes as u64),
        (
            "debugger.pause_timeout_secs",
            config.debugger.pause_timeout_secs.unwrap_or(1),
        ),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    // Connection limits and channel depths are semaphore permits.
    let bounded = [
        ("listener.max_connections", config.listener.max_connections),
        ("control.session_queue", config.control.session_queue),
        ("control.command_queue", config.control.command_queue),
    ];
    for (field, value) in bounded {
        if value > Semaphore::MAX_PERMITS {
            errors.push(ValidationError::TooLarge {
                field,
                max: Semaphore::MAX_PERMITS,
            });
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::LogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
