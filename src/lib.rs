//! # Joystick Arbiter Library
//!
//! Joystick input arbitration and normalization.
//!
//! This library opens every connected joystick, reduces their buttons, hats
//! and axes to a single "most active" input per class, normalizes axis values
//! against a deadzone and applies key-repeat timing to held buttons and hats.

pub mod config;
pub mod controller;
pub mod error;
pub mod recorder;
