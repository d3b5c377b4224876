//! Configuration structures for Linelog

use crate::{LinelogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Backing file configuration
    pub storage: StorageSettings,
    /// Periodic timestamp configuration
    pub annotator: AnnotatorSettings,
}

/// Core server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind the listener to
    pub bind_address: String,
    /// TCP port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Size of the scratch chunk used for each receive call
    pub recv_chunk_size: usize,
    /// Maximum frame size in bytes, 0 for unlimited
    pub max_frame_bytes: usize,
    /// Fork into the background after binding
    pub daemon: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path of the shared log file
    pub data_file: PathBuf,
    /// Delete the shared log file on graceful shutdown
    pub remove_on_shutdown: bool,
}

/// Periodic annotator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorSettings {
    /// Enable the timestamp annotator
    pub enabled: bool,
    /// Seconds between timestamp records
    pub interval_secs: u64,
    /// strftime-style pattern for each record, newline excluded
    pub timestamp_format: String,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address to connect to
    pub server_address: String,
    /// Timeout in seconds for connecting and for the whole exchange
    pub timeout_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9000,
            recv_chunk_size: 100,
            max_frame_bytes: 0,
            daemon: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("/var/tmp/aesdsocketdata"),
            remove_on_shutdown: true,
        }
    }
}

impl Default for AnnotatorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timestamp_format: "timestamp:%a, %d %b %Y %H:%M:%S %z".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:9000".to_string(),
            timeout_seconds: 5,
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinelogError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| LinelogError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(LinelogError::Config("Bind address cannot be empty".to_string()));
        }
        if self.server.recv_chunk_size == 0 {
            return Err(LinelogError::Config(
                "Receive chunk size must be greater than zero".to_string(),
            ));
        }
        if self.storage.data_file.as_os_str().is_empty() {
            return Err(LinelogError::Config("Data file path cannot be empty".to_string()));
        }
        if self.annotator.enabled {
            if self.annotator.interval_secs == 0 {
                return Err(LinelogError::Config(
                    "Annotator interval must be greater than zero".to_string(),
                ));
            }
            if self.annotator.timestamp_format.is_empty() {
                return Err(LinelogError::Config(
                    "Timestamp format cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Listener address as `host:port`
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

impl AnnotatorSettings {
    /// Interval between timestamp records
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ClientConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_address.is_empty() {
            return Err(LinelogError::Config("Server address cannot be empty".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(LinelogError::Config("Timeout must be greater than zero".to_string()));
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
    fn test_defaults_match_reference_server() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.recv_chunk_size, 100);
        assert_eq!(config.storage.data_file, PathBuf::from("/var/tmp/aesdsocketdata"));
        assert_eq!(config.annotator.interval(), Duration::from_secs(10));
        assert!(config.storage.remove_on_shutdown);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9100\n\n[annotator]\nenabled = false").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert!(!config.annotator.enabled);
        assert_eq!(config.annotator.interval_secs, 10);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        match ServerConfig::from_file(file.path()) {
            Err(LinelogError::Config(msg)) => assert!(msg.contains("parse")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = ServerConfig::from_file("/nonexistent/linelog.toml");
        assert!(matches!(result, Err(LinelogError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let mut config = ServerConfig::default();
        config.server.recv_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_annotator_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.annotator.interval_secs = 0;
        assert!(config.validate().is_err());

        config.annotator.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_data_file() {
        let mut config = ServerConfig::default();
        config.storage.data_file = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_listen_address() {
        let mut config = ServerConfig::default();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.port = 0;
        assert_eq!(config.listen_address(), "127.0.0.1:0");
    }

    #[test]
    fn test_client_config_validation() {
        assert!(ClientConfig::default().validate().is_ok());

        let config = ClientConfig {
            server_address: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
