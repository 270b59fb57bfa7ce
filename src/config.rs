//! # Configuration Management
//!
//! Client-side settings for the RCON and Server List Ping clients, plus logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! Per-server credentials are not part of this configuration; they come from a
//! [`ServerConfigStore`](crate::service::store::ServerConfigStore).

use crate::error::{Error, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Largest RCON payload a server sends in a single packet
pub const RCON_MAX_CLIENTBOUND_PAYLOAD: usize = 4096;

/// Largest RCON payload a server accepts from a client
pub const RCON_MAX_SERVERBOUND_PAYLOAD: usize = 1446;

/// Largest SLP frame (the maximum value of a three byte VarInt)
pub const SLP_MAX_FRAME: usize = 2_097_151;

/// Protocol version sent in the handshake.
///
/// A negative version asks the server for its generic status response.
pub const SLP_STATUS_PROTOCOL_VERSION: i32 = -1;

/// Handshake `next_state` value selecting the status state
pub const SLP_NEXT_STATE_STATUS: i32 = 1;

/// Top level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Connection settings shared by the RCON pool and the SLP factory
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| Error::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| Error::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("MC_REMOTE_CONNECT_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|e| {
                Error::ConfigError(format!("Invalid MC_REMOTE_CONNECT_TIMEOUT_MS: {e}"))
            })?;
            config.client.connect_timeout = Duration::from_millis(millis);
        }

        if let Ok(level) = std::env::var("MC_REMOTE_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| Error::ConfigError(format!("Invalid MC_REMOTE_LOG_LEVEL: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Connection settings for outbound clients
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on establishing the TCP connection
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Largest RCON payload accepted from a server
    pub max_rcon_payload: usize,

    /// Largest SLP frame accepted from a server
    pub max_slp_frame: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: timeout::DEFAULT_CONNECT_TIMEOUT,
            max_rcon_payload: RCON_MAX_CLIENTBOUND_PAYLOAD,
            max_slp_frame: SLP_MAX_FRAME,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        // Vanilla servers fragment at 4096 bytes, anything smaller breaks long replies
        if self.max_rcon_payload < RCON_MAX_CLIENTBOUND_PAYLOAD {
            errors.push(format!(
                "Max RCON payload too small: {} bytes (minimum: {RCON_MAX_CLIENTBOUND_PAYLOAD})",
                self.max_rcon_payload
            ));
        } else if self.max_rcon_payload > 1024 * 1024 {
            errors.push(format!(
                "Max RCON payload too large: {} bytes (maximum: 1 MB)",
                self.max_rcon_payload
            ));
        }

        if self.max_slp_frame < 1024 {
            errors.push("Max SLP frame too small (minimum: 1 KB)".to_string());
        } else if self.max_slp_frame > SLP_MAX_FRAME {
            errors.push(format!(
                "Max SLP frame too large: {} bytes (maximum: {SLP_MAX_FRAME})",
                self.max_slp_frame
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to file instead of the console
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("mc-remote"),
            log_level: Level::INFO,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
