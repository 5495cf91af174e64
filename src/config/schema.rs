//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults so a file only needs the values it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Where clients connect.
    pub listener: ListenerConfig,

    /// The single backend every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Observer WebSocket and UI.
    pub control: ControlConfig,

    pub debugger: DebuggerConfig,

    pub limits: LimitsConfig,

    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "localhost:3333"). Required.
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::new(),
            max_connections: 10_000,
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend address (e.g., "localhost:4444"). Required.
    pub address: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for the upstream to answer once connected, in seconds.
    pub response_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            connect_timeout_secs: 5,
            response_timeout_secs: 60,
        }
    }
}

/// Control plane configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Bind address for the observer socket and UI.
    pub bind_address: String,

    /// Directory of static UI files served at `/`.
    pub assets_dir: Option<PathBuf>,

    /// Outbound queue depth per observer.
    pub session_queue: usize,

    /// Dispatcher input queue depth.
    pub command_queue: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: ":9999".to_string(),
            assets_dir: None,
            session_queue: 1024,
            command_queue: 64,
        }
    }
}

/// Debugger configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DebuggerConfig {
    /// Start with debugging already enabled.
    pub start_enabled: bool,

    /// Force-resume a paused handler after this many seconds.
    /// Unset means pauses last until an operator acts.
    pub pause_timeout_secs: Option<u64>,
}

/// Size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered body size, requests and responses alike.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8 * 1024 * 1024, // 8MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Prometheus scrape address. Unset disables the exporter.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_address: None,
        }
    }
}
