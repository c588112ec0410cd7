//! Broker Configuration
//!
//! Configuration for the broker's listener, WebSocket endpoint and logging.
//! Every field has a default, so an empty JSON object is a valid config file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::observability::LogFormat;
use crate::realtime::{RealtimeError, RealtimeResult, DEFAULT_OUTBOUND_CAPACITY};

/// Broker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Host to bind to (default: "localhost")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 10209)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the WebSocket upgrade endpoint (default: "/")
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// CORS allowed origins (default: empty, meaning any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Log line format (default: pretty)
    #[serde(default)]
    pub log_format: LogFormat,

    /// Frames queued per connection before broadcasts to it are dropped
    /// (default: 256)
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    10209
}

fn default_ws_path() -> String {
    "/".to_string()
}

fn default_outbound_capacity() -> usize {
    DEFAULT_OUTBOUND_CAPACITY
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            cors_origins: Vec::new(),
            log_format: LogFormat::default(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> RealtimeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RealtimeError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: BrokerConfig = serde_json::from_str(&content)
            .map_err(|e| RealtimeError::ConfigError(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a config listening on `host:port`
    pub fn with_addr(addr: &str) -> RealtimeResult<Self> {
        Self::default().override_addr(addr)
    }

    /// Replace host and port with those parsed from `host:port`
    pub fn override_addr(mut self, addr: &str) -> RealtimeResult<Self> {
        let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
            RealtimeError::ConfigError(format!("Address must be host:port, got '{}'", addr))
        })?;

        self.port = port
            .parse()
            .map_err(|_| RealtimeError::ConfigError(format!("Invalid port in '{}'", addr)))?;
        self.host = host.trim_start_matches('[').trim_end_matches(']').to_string();

        self.validate()?;
        Ok(self)
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn validate(&self) -> RealtimeResult<()> {
        if self.host.is_empty() {
            return Err(RealtimeError::ConfigError("host must not be empty".into()));
        }
        if self.outbound_capacity == 0 {
            return Err(RealtimeError::ConfigError(
                "outbound_capacity must be at least 1".into(),
            ));
        }
        if !self.ws_path.starts_with('/') {
            return Err(RealtimeError::ConfigError(format!(
                "ws_path must start with '/', got '{}'",
                self.ws_path
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.socket_addr(), "localhost:10209");
        assert_eq!(config.ws_path, "/");
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.outbound_capacity, 256);
    }

    #[test]
    fn test_with_addr() {
        let config = BrokerConfig::with_addr("127.0.0.1:8080").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);

        let config = BrokerConfig::with_addr("[::1]:9000").unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.socket_addr(), "[::1]:9000");
    }

    #[test]
    fn test_with_addr_rejects_garbage() {
        assert!(BrokerConfig::with_addr("localhost").is_err());
        assert!(BrokerConfig::with_addr("localhost:http").is_err());
        assert!(BrokerConfig::with_addr(":80").is_err());
    }

    #[test]
    fn test_load_empty_object_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();

        let config = BrokerConfig::load(file.path()).unwrap();
        assert_eq!(config, BrokerConfig::default());
    }

    #[test]
    fn test_load_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host": "0.0.0.0", "port": 4000, "ws_path": "/ws", "log_format": "json"}}"#
        )
        .unwrap();

        let config = BrokerConfig::load(file.path()).unwrap();
        assert_eq!(config.socket_addr(), "0.0.0.0:4000");
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_load_rejects_bad_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"ws_path": "ws"}}"#).unwrap();

        let err = BrokerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, RealtimeError::ConfigError(_)));
    }

    #[test]
    fn test_load_rejects_zero_capacity() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"outbound_capacity": 0}}"#).unwrap();

        let err = BrokerConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("outbound_capacity"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = BrokerConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
