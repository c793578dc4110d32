//! Configuration management for Wardrobe
//!
//! Defaults are overridden by `wardrobe.toml` (when present), then by
//! `WARDROBE_*` environment variables, then validated.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use wardrobe_core::constants::{
    DEFAULT_COMPRESSION_QUALITY, DEFAULT_COMPRESSION_WINDOW, DEFAULT_MAX_PAYLOAD_BYTES,
};
use wardrobe_core::WireCodec;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "wardrobe.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Wire codec settings
    pub codec: CodecConfig,

    /// Entity state lifecycle
    pub state: StateConfig,

    /// Metrics collection
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, compact)
    pub format: String,
}

/// Wire codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Brotli quality (0-11)
    pub quality: u32,

    /// Brotli window size, log2 (10-24)
    pub window: u32,

    /// Largest accepted decompressed payload (bytes)
    pub max_payload_bytes: usize,
}

/// Entity state configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Keep locked or customized entities when the host stops observing them
    pub retain_on_evict: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record Prometheus counters
    pub enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_COMPRESSION_QUALITY,
            window: DEFAULT_COMPRESSION_WINDOW,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { retain_on_evict: true }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self> {
        let mut config = if Path::new(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Config::default()
        };

        // Override with environment variables
        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        // Logging overrides
        if let Some(level) = var("WARDROBE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = var("WARDROBE_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Codec overrides
        if let Some(quality) = var("WARDROBE_CODEC_QUALITY") {
            self.codec.quality = quality.parse()
                .map_err(|e| Error::config(format!("Invalid codec quality: {}", e)))?;
        }

        if let Some(window) = var("WARDROBE_CODEC_WINDOW") {
            self.codec.window = window.parse()
                .map_err(|e| Error::config(format!("Invalid codec window: {}", e)))?;
        }

        if let Some(max) = var("WARDROBE_MAX_PAYLOAD_BYTES") {
            self.codec.max_payload_bytes = max.parse()
                .map_err(|e| Error::config(format!("Invalid max payload size: {}", e)))?;
        }

        // State and metrics overrides
        if let Some(retain) = var("WARDROBE_RETAIN_ON_EVICT") {
            self.state.retain_on_evict = retain.parse()
                .map_err(|e| Error::config(format!("Invalid retain flag: {}", e)))?;
        }

        if let Some(enabled) = var("WARDROBE_METRICS") {
            self.metrics.enabled = enabled.parse()
                .map_err(|e| Error::config(format!("Invalid metrics flag: {}", e)))?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config(format!("Invalid log level: {}", self.logging.level))),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => return Err(Error::config(format!("Invalid log format: {}", self.logging.format))),
        }

        if self.codec.quality > 11 {
            return Err(Error::config("Codec quality out of range (0-11)"));
        }

        if !(10..=24).contains(&self.codec.window) {
            return Err(Error::config("Codec window out of range (10-24)"));
        }

        if self.codec.max_payload_bytes < wardrobe_core::constants::WIRE_V3_LEN {
            return Err(Error::config("Max payload size smaller than a current design"));
        }

        Ok(())
    }

    /// Build the wire codec described by this configuration
    pub fn wire_codec(&self) -> WireCodec {
        WireCodec::new(self.codec.quality, self.codec.window, self.codec.max_payload_bytes)
    }
}
