//! # Error Types
//!
//! Custom error types for Joystick Arbiter using `thiserror`.

use thiserror::Error;

/// Main error type for Joystick Arbiter
#[derive(Debug, Error)]
pub enum ArbiterError {
    /// The device subsystem could not be started or enumerated
    #[error("Device subsystem unavailable: {0}")]
    SubsystemUnavailable(String),

    /// The device subsystem still reports itself running after a stop request
    #[error("Stop joystick subsystem failed")]
    SubsystemStopFailed,

    /// A signal referenced a device index that is not in the device table
    #[error("Device index {device} out of range ({count} devices open)")]
    DeviceOutOfRange { device: usize, count: usize },

    /// A signal referenced a button the device does not have
    #[error("Button id {button} out of range. Device has {count} buttons")]
    ButtonOutOfRange { button: usize, count: usize },

    /// A signal referenced a hat the device does not have
    #[error("Hat id {hat} out of range. Device has {count} hats")]
    HatOutOfRange { hat: usize, count: usize },

    /// A signal referenced an axis the device lacks or beyond the supported maximum
    #[error("Axis id {axis} out of range. Maximum supported axis: {max}")]
    AxisOutOfRange { axis: usize, max: usize },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Joystick Arbiter
pub type Result<T> = std::result::Result<T, ArbiterError>;
