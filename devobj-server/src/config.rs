//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DEVOBJ_CONFIG)
//! 3. Environment variables

use devobj_protocol::{
    DEFAULT_MAX_TOKENS, DEFAULT_PORT, DEFAULT_RESPONSE_BUFFER_LEN, MIN_RESPONSE_BUFFER_LEN,
};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Request and response limits.
    pub protocol: ProtocolConfig,
    /// Periodic publication messages.
    pub publish: PublishConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DEVOBJ_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.protocol.apply_env_overrides();
        self.publish.apply_env_overrides();
    }

    /// Checks limits that would make the device unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        self.protocol.validate()?;
        self.publish.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 64,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("DEVOBJ_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("DEVOBJ_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("DEVOBJ_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Request and response limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Response buffer capacity in bytes.
    pub response_buffer_len: usize,
    /// Maximum number of JSON tokens in one request.
    pub max_tokens: usize,
    /// Include the human-readable phrase in status lines.
    pub verbose_status: bool,
    /// Longest accepted request line in bytes.
    pub max_request_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            response_buffer_len: DEFAULT_RESPONSE_BUFFER_LEN,
            max_tokens: DEFAULT_MAX_TOKENS,
            verbose_status: true,
            max_request_len: 1024,
        }
    }
}

impl ProtocolConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(len) = std::env::var("DEVOBJ_RESPONSE_BUFFER_LEN") {
            if let Ok(n) = len.parse() {
                self.response_buffer_len = n;
            }
        }

        if let Ok(max) = std::env::var("DEVOBJ_MAX_TOKENS") {
            if let Ok(n) = max.parse() {
                self.max_tokens = n;
            }
        }

        if let Ok(verbose) = std::env::var("DEVOBJ_VERBOSE_STATUS") {
            self.verbose_status = verbose == "1" || verbose.to_lowercase() == "true";
        }

        if let Ok(len) = std::env::var("DEVOBJ_MAX_REQUEST_LEN") {
            if let Ok(n) = len.parse() {
                self.max_request_len = n;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.response_buffer_len < MIN_RESPONSE_BUFFER_LEN {
            return Err(ConfigError::ValidationError(format!(
                "protocol.response_buffer_len must be at least {} (got {})",
                MIN_RESPONSE_BUFFER_LEN, self.response_buffer_len
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "protocol.max_tokens must be at least 1".to_string(),
            ));
        }
        if self.max_request_len == 0 {
            return Err(ConfigError::ValidationError(
                "protocol.max_request_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Periodic publication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Emit publication messages.
    pub enabled: bool,
    /// Interval between publications in milliseconds.
    pub interval_ms: u64,
    /// Ids of the objects included in every publication, in order.
    pub ids: Vec<u16>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 1000,
            ids: Vec::new(),
        }
    }
}

impl PublishConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("DEVOBJ_PUBLISH_ENABLED") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }

        if let Ok(interval) = std::env::var("DEVOBJ_PUBLISH_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.interval_ms = ms;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "publish.interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the publication interval as Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serializes a SocketAddr as a plain string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
