//! Agent configuration
//!
//! Settings come from an optional TOML file merged with command-line
//! overrides; the file may omit any field.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the device agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Relay server host
    pub host: Option<String>,

    /// Relay server port
    pub port: Option<u16>,

    /// Explicit device id (overrides the interface-derived id, max 63 bytes)
    pub device_id: Option<String>,

    /// Network interface whose hardware address becomes the device id
    pub interface: Option<String>,

    /// Reconnect automatically when the connection is lost
    pub auto_reconnect: bool,

    /// Interval between keepalive probes while connected
    #[serde(with = "duration_secs")]
    pub keepalive_interval: Duration,

    /// Missed probes tolerated before the connection is declared dead
    pub keepalive_budget: u32,

    /// Delay between reconnect attempts
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,

    /// Override for the discovered login program
    pub login_program: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            device_id: None,
            interface: None,
            auto_reconnect: false,
            keepalive_interval: Duration::from_secs(10),
            keepalive_budget: 3,
            reconnect_delay: Duration::from_secs(5),
            login_program: None,
        }
    }
}

impl AgentConfig {
    /// Relay endpoint for a device, or an error if host/port are unset
    pub fn server_url(&self, device_id: &str) -> Result<String, ConfigError> {
        let host = self.host.as_deref().ok_or(ConfigError::MissingField("host"))?;
        let port = self.port.ok_or(ConfigError::MissingField("port"))?;
        Ok(format!("ws://{}:{}/ws/device?did={}", host, port, device_id))
    }
}

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ttylink")
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: AgentConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Helper module for Duration serialization as whole seconds
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_timings() {
        let config = AgentConfig::default();
        assert_eq!(config.keepalive_interval, Duration::from_secs(10));
        assert_eq!(config.keepalive_budget, 3);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert!(!config.auto_reconnect);
    }

    #[test]
    fn test_server_url() {
        let config = AgentConfig {
            host: Some("relay.example.com".to_string()),
            port: Some(5912),
            ..Default::default()
        };
        assert_eq!(
            config.server_url("8cf1a3b25e10").unwrap(),
            "ws://relay.example.com:5912/ws/device?did=8cf1a3b25e10"
        );
    }

    #[test]
    fn test_server_url_requires_host_and_port() {
        let config = AgentConfig::default();
        assert!(matches!(
            config.server_url("x"),
            Err(ConfigError::MissingField("host"))
        ));

        let config = AgentConfig {
            host: Some("relay".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.server_url("x"),
            Err(ConfigError::MissingField("port"))
        ));
    }

    #[test]
    fn test_load_partial_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"relay\"\nauto_reconnect = true\nkeepalive_interval = 30").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.host.as_deref(), Some("relay"));
        assert!(config.auto_reconnect);
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        // Unset fields keep their defaults
        assert_eq!(config.keepalive_budget, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config(Path::new("/nonexistent/ttylink.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
