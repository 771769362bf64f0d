//! # Configuration Management
//!
//! Centralized configuration for the message engine.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (prefix `MAVLINK_ENGINE_`)
//!
//! ## Security Considerations
//! - `ignore_checksum` exists for diagnosing damaged links only. It can be set
//!   from a config file but never from the environment, and a warning is
//!   logged whenever a session starts with it enabled.
//! - Signing keys are 32 bytes, given as 64 hex characters or derived from a
//!   passphrase with SHA-256. Keys are zeroized when dropped.

use crate::core::header::WireVersion;
use crate::error::{ProtocolError, Result};
use crate::protocol::signing::SecretKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Protocol version emitted by default
pub const DEFAULT_WIRE_VERSION: WireVersion = WireVersion::V2;

/// Default bound on the signing replay table
pub const DEFAULT_MAX_STREAM_KEYS: usize = 1024;

/// How the parser treats malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Malformed frames are returned as errors
    #[default]
    Strict,
    /// Malformed frames become bad-data placeholder messages
    Robust,
}

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    /// Identity and parsing behaviour of a session
    #[serde(default)]
    pub link: LinkConfig,

    /// Frame signing
    #[serde(default)]
    pub signing: SigningConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("MAVLINK_ENGINE_SYSTEM_ID") {
            config.link.system_id = parse_env("MAVLINK_ENGINE_SYSTEM_ID", &value)?;
        }

        if let Ok(value) = std::env::var("MAVLINK_ENGINE_COMPONENT_ID") {
            config.link.component_id = parse_env("MAVLINK_ENGINE_COMPONENT_ID", &value)?;
        }

        if let Ok(value) = std::env::var("MAVLINK_ENGINE_WIRE_VERSION") {
            config.link.wire_version = match value.as_str() {
                "1" | "1.0" => WireVersion::V1,
                "2" | "2.0" => WireVersion::V2,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid MAVLINK_ENGINE_WIRE_VERSION: '{other}' (expected 1 or 2)"
                    )))
                }
            };
        }

        if let Ok(value) = std::env::var("MAVLINK_ENGINE_PARSE_MODE") {
            config.link.parse_mode = match value.to_lowercase().as_str() {
                "strict" => ParseMode::Strict,
                "robust" => ParseMode::Robust,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid MAVLINK_ENGINE_PARSE_MODE: '{other}' (expected strict or robust)"
                    )))
                }
            };
        }

        if let Ok(value) = std::env::var("MAVLINK_ENGINE_SIGNING_KEY") {
            config.signing.secret_key = Some(value);
        }

        if let Ok(value) = std::env::var("MAVLINK_ENGINE_SIGN_OUTGOING") {
            config.signing.sign_outgoing = parse_env("MAVLINK_ENGINE_SIGN_OUTGOING", &value)?;
        }

        if let Ok(value) = std::env::var("MAVLINK_ENGINE_LINK_ID") {
            config.signing.link_id = parse_env("MAVLINK_ENGINE_LINK_ID", &value)?;
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
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.link.validate());
        errors.extend(self.signing.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid {name}: '{value}'")))
}

/// Session identity and parsing behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Source system id stamped on outgoing frames
    pub system_id: u8,

    /// Source component id stamped on outgoing frames
    pub component_id: u8,

    /// Header version used for outgoing frames
    pub wire_version: WireVersion,

    /// Strict or robust handling of malformed input
    pub parse_mode: ParseMode,

    /// Accept frames whose checksum does not match. Diagnostic use only.
    #[serde(default)]
    pub ignore_checksum: bool,

    /// Maximum number of signed streams tracked for replay protection
    pub max_stream_keys: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            system_id: 255,
            component_id: 0,
            wire_version: DEFAULT_WIRE_VERSION,
            parse_mode: ParseMode::Strict,
            ignore_checksum: false,
            max_stream_keys: DEFAULT_MAX_STREAM_KEYS,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_stream_keys == 0 {
            errors.push("max_stream_keys must be greater than 0".to_string());
        } else if self.max_stream_keys > 1_000_000 {
            errors.push(format!(
                "max_stream_keys too large: {} (max recommended: 1,000,000)",
                self.max_stream_keys
            ));
        }

        if self.ignore_checksum {
            errors.push(
                "WARNING: ignore_checksum is enabled - corrupted frames will be accepted"
                    .to_string(),
            );
        }

        errors
    }
}

/// Frame signing configuration
#[derive(Clone, Deserialize, Serialize, Default)]
pub struct SigningConfig {
    /// Secret key as 64 hex characters
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Passphrase to derive the secret key from (SHA-256)
    #[serde(default)]
    pub passphrase: Option<String>,

    /// Link id placed in outgoing signatures
    #[serde(default)]
    pub link_id: u8,

    /// Whether outgoing V2 frames are signed
    #[serde(default)]
    pub sign_outgoing: bool,

    /// Starting signing timestamp; wall clock when absent
    #[serde(default)]
    pub initial_timestamp: Option<u64>,
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("SigningConfig")
            .field("secret_key", &redact(&self.secret_key))
            .field("passphrase", &redact(&self.passphrase))
            .field("link_id", &self.link_id)
            .field("sign_outgoing", &self.sign_outgoing)
            .field("initial_timestamp", &self.initial_timestamp)
            .finish()
    }
}

impl SigningConfig {
    /// Resolve the configured key, if any.
    pub fn key(&self) -> Result<Option<SecretKey>> {
        match (&self.secret_key, &self.passphrase) {
            (Some(_), Some(_)) => Err(ProtocolError::ConfigError(
                "Specify either secret_key or passphrase, not both".to_string(),
            )),
            (Some(hex_key), None) => SecretKey::from_hex(hex_key).map(Some),
            (None, Some(passphrase)) => Ok(Some(SecretKey::from_passphrase(passphrase))),
            (None, None) => Ok(None),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.key() {
            Err(e) => errors.push(e.to_string()),
            Ok(None) if self.sign_outgoing => {
                errors.push("sign_outgoing requires a secret_key or passphrase".to_string())
            }
            Ok(_) => {}
        }

        if let Some(ts) = self.initial_timestamp {
            if ts >= 1 << 48 {
                errors.push(format!(
                    "initial_timestamp {ts} does not fit the 48-bit signing timestamp"
                ));
            }
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

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("mavlink-engine"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
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

        errors
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
