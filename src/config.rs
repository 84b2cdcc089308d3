//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field is optional; missing values fall back to the
//! defaults below.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::controller::repeat::{RepeatPolicy, DEFAULT_INITIAL_DELAY_MS, DEFAULT_REPEAT_INTERVAL_MS};
use crate::controller::subsystem::InputSettings;
use crate::error::{ArbiterError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub repeat: RepeatConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input enable flag and deadzone
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,
}

/// Key-repeat timing for held buttons and hats
#[derive(Debug, Deserialize, Clone)]
pub struct RepeatConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Polling loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_rate_hz")]
    pub rate_hz: u32,
}

/// Device acquisition filters
#[derive(Debug, Deserialize, Clone)]
pub struct DevicesConfig {
    #[serde(default = "default_excluded_names")]
    pub excluded_names: Vec<String>,
}

/// Snapshot recorder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecorderConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_recorder_path")]
    pub path: String,

    #[serde(default)]
    pub min_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub directory: String,
}

// Default value functions
fn default_enabled() -> bool { true }
fn default_deadzone() -> f32 { 0.2 }

fn default_initial_delay_ms() -> u64 { DEFAULT_INITIAL_DELAY_MS }
fn default_interval_ms() -> u64 { DEFAULT_REPEAT_INTERVAL_MS }

fn default_rate_hz() -> u32 { 60 }

// Xbox 360 pads are driven by a dedicated driver on macOS
#[cfg(target_os = "macos")]
fn default_excluded_names() -> Vec<String> { vec!["360".to_string()] }
#[cfg(not(target_os = "macos"))]
fn default_excluded_names() -> Vec<String> { Vec::new() }

fn default_recorder_path() -> String { "./snapshots.jsonl".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            deadzone: default_deadzone(),
        }
    }
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            excluded_names: default_excluded_names(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_recorder_path(),
            min_interval_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> ArbiterError {
    ArbiterError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joystick_arbiter::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Repeat timing as used by the input subsystem
    #[must_use]
    pub fn repeat_policy(&self) -> RepeatPolicy {
        RepeatPolicy {
            initial_delay_ms: self.repeat.initial_delay_ms,
            interval_ms: self.repeat.interval_ms,
        }
    }

    /// Startup settings for the input subsystem
    #[must_use]
    pub fn input_settings(&self) -> InputSettings {
        InputSettings {
            deadzone: self.input.deadzone,
            repeat: self.repeat_policy(),
            excluded_names: self.devices.excluded_names.clone(),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate deadzone
        if !(0.0..=1.0).contains(&self.input.deadzone) {
            return Err(invalid("deadzone must be between 0.0 and 1.0"));
        }

        // Validate repeat timing
        if self.repeat.initial_delay_ms == 0 || self.repeat.initial_delay_ms > 10000 {
            return Err(invalid("initial_delay_ms must be between 1 and 10000"));
        }

        if self.repeat.interval_ms == 0 || self.repeat.interval_ms > 10000 {
            return Err(invalid("interval_ms must be between 1 and 10000"));
        }

        // Validate polling rate
        if ![30, 60, 120, 250].contains(&self.polling.rate_hz) {
            return Err(invalid("rate_hz must be one of: 30, 60, 120, 250"));
        }

        // Validate exclusion patterns
        if self.devices.excluded_names.iter().any(|name| name.is_empty()) {
            return Err(invalid("excluded_names entries cannot be empty"));
        }

        // Validate recorder configuration
        if self.recorder.enabled && self.recorder.path.is_empty() {
            return Err(invalid("recorder path cannot be empty when enabled"));
        }

        // Validate log level
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.input.enabled);
        assert_eq!(config.input.deadzone, 0.2);
        assert!(!config.recorder.enabled);
        assert!(config.logging.directory.is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.polling.rate_hz, 60);
        assert_eq!(config.repeat_policy(), RepeatPolicy::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[input]
enabled = false
deadzone = 0.25

[repeat]
initial_delay_ms = 400
interval_ms = 50

[polling]
rate_hz = 120

[devices]
excluded_names = ["Virtual", "360"]

[recorder]
enabled = true
path = "/tmp/pad.jsonl"
min_interval_ms = 20

[logging]
level = "debug"
directory = "./logs"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert!(!config.input.enabled);
        assert_eq!(config.input.deadzone, 0.25);
        assert_eq!(config.repeat.initial_delay_ms, 400);
        assert_eq!(config.polling.rate_hz, 120);
        assert_eq!(config.devices.excluded_names, vec!["Virtual", "360"]);
        assert!(config.recorder.enabled);
        assert_eq!(config.recorder.min_interval_ms, 20);
        assert_eq!(config.logging.directory, "./logs");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/joystick.toml");
        assert!(matches!(result, Err(ArbiterError::Io(_))));
    }

    #[test]
    fn test_load_malformed_toml() {
        let result = Config::from_toml("[input\nenabled = ");
        assert!(matches!(result, Err(ArbiterError::Config(_))));
    }

    #[test]
    fn test_input_settings() {
        let mut config = Config::default();
        config.input.deadzone = 0.3;
        config.devices.excluded_names = vec!["Wheel".to_string()];

        let settings = config.input_settings();
        assert_eq!(settings.deadzone, 0.3);
        assert_eq!(settings.repeat.initial_delay_ms, 500);
        assert_eq!(settings.excluded_names, vec!["Wheel".to_string()]);
    }

    #[test]
    fn test_deadzone_negative() {
        let mut config = Config::default();
        config.input.deadzone = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadzone_too_high() {
        let mut config = Config::default();
        config.input.deadzone = 1.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadzone_bounds_are_valid() {
        for &deadzone in &[0.0, 1.0] {
            let mut config = Config::default();
            config.input.deadzone = deadzone;
            assert!(config.validate().is_ok(), "Deadzone {} should be valid", deadzone);
        }
    }

    #[test]
    fn test_initial_delay_zero() {
        let mut config = Config::default();
        config.repeat.initial_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_delay_too_high() {
        let mut config = Config::default();
        config.repeat.initial_delay_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_zero() {
        let mut config = Config::default();
        config.repeat.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_high() {
        let mut config = Config::default();
        config.repeat.interval_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_rate() {
        let mut config = Config::default();
        config.polling.rate_hz = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_rates() {
        for &rate in &[30, 60, 120, 250] {
            let mut config = Config::default();
            config.polling.rate_hz = rate;
            assert!(config.validate().is_ok(), "Rate {} should be valid", rate);
        }
    }

    #[test]
    fn test_empty_exclusion_pattern() {
        let mut config = Config::default();
        config.devices.excluded_names = vec!["Wheel".to_string(), String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_recorder_path_when_enabled() {
        let mut config = Config::default();
        config.recorder.enabled = true;
        config.recorder.path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_recorder_path_when_disabled() {
        let mut config = Config::default();
        config.recorder.enabled = false;
        config.recorder.path = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Level {} should be valid", level);
        }
    }

    #[test]
    fn test_default_functions() {
        assert!(default_enabled());
        assert_eq!(default_deadzone(), 0.2);
        assert_eq!(default_initial_delay_ms(), 500);
        assert_eq!(default_interval_ms(), 100);
        assert_eq!(default_rate_hz(), 60);
        assert_eq!(default_recorder_path(), "./snapshots.jsonl");
        assert_eq!(default_log_level(), "info");
        if cfg!(target_os = "macos") {
            assert_eq!(default_excluded_names(), vec!["360".to_string()]);
        } else {
            assert!(default_excluded_names().is_empty());
        }
    }
}
