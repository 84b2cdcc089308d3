//! # Controller Module
//!
//! Joystick input acquisition, normalization and arbitration.
//!
//! This module handles:
//! - Joystick detection and connection via evdev
//! - Reading button, hat and axis state
//! - Applying the deadzone and normalizing axes
//! - Electing one active button, hat and axis across all devices
//! - Key-repeat filtering of held buttons and hats

pub mod arbiter;
pub mod clock;
pub mod device;
pub mod evdev_backend;
pub mod event;
pub mod hat;
pub mod normalize;
pub mod repeat;
pub mod snapshot;
pub mod subsystem;
