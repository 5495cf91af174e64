//! Command-line flags.
//!
//! Flags override values from the optional config file, which override the
//! built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::ProxyConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Default, Parser)]
#[command(name = "httpception")]
#[command(about = "HTTP proxy that lets an operator watch and pause live traffic", long_about = None)]
pub struct Cli {
    /// Address to listen for new connections (ex: localhost:3333)
    #[arg(long)]
    pub listen: Option<String>,

    /// Address to forward requests to (ex: localhost:4444)
    #[arg(long)]
    pub send: Option<String>,

    /// Address to listen for debugging connections (default: :9999)
    #[arg(long)]
    pub debug: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of static UI files to serve on the debugging address
    #[arg(long)]
    pub assets: Option<PathBuf>,

    /// Start with debugging enabled
    #[arg(long)]
    pub start_enabled: bool,

    /// Force-resume paused requests after this many seconds
    #[arg(long)]
    pub pause_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Address for the Prometheus metrics endpoint
    #[arg(long)]
    pub metrics: Option<String>,
}

impl Cli {
    /// Merge file and flags into a validated configuration.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(send) = self.send {
            config.upstream.address = send;
        }
        if let Some(debug) = self.debug {
            config.control.bind_address = debug;
        }
        if let Some(assets) = self.assets {
            config.control.assets_dir = Some(assets);
        }
        if self.start_enabled {
            config.debugger.start_enabled = true;
        }
        if let Some(secs) = self.pause_timeout {
            config.debugger.pause_timeout_secs = Some(secs);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(metrics) = self.metrics {
            config.observability.metrics_address = Some(metrics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_and_send_flags() {
        let cli = Cli::try_parse_from(["httpception", "--listen", "localhost:3333", "--send", "localhost:4444"]).unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.listener.bind_address, "localhost:3333");
        assert_eq!(config.upstream.address, "localhost:4444");
        assert_eq!(config.control.bind_address, ":9999");
    }

    #[test]
    fn missing_required_flags_fail_validation() {
        let cli = Cli::try_parse_from(["httpception", "--listen", "localhost:3333"]).unwrap();
        let err = cli.into_config().unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: upstream address is required");
    }

    #[test]
    fn flags_override_file() {
        let path = std::env::temp_dir().join(format!("httpception-cli-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[listener]\nbind_address = \"127.0.0.1:1\"\n[upstream]\naddress = \"127.0.0.1:2\"\n[control]\nbind_address = \"127.0.0.1:3\"\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "httpception",
            "--config",
            path.to_str().unwrap(),
            "--send",
            "127.0.0.1:9",
            "--start-enabled",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:1");
        assert_eq!(config.upstream.address, "127.0.0.1:9");
        assert_eq!(config.control.bind_address, "127.0.0.1:3");
        assert!(config.debugger.start_enabled);
        let _ = std::fs::remove_file(path);
    }
}
