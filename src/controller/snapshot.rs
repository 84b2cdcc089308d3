//! # Device Snapshots
//!
//! Full-fidelity, per-device state pushed to an external consumer alongside
//! arbitration. Unlike the arbiter, which keeps a single winner per input
//! class, a snapshot carries every button, hat and axis of one device, with
//! axes already normalized to -1.0..=1.0.

use serde::Serialize;

use super::device::RawDevice;
use super::event::JoystickEvent;
use super::hat::HatDirections;
use super::normalize::Deadzone;

/// Maximum number of buttons carried per snapshot.
pub const MAX_SNAPSHOT_BUTTONS: usize = 32;
/// Maximum number of hats carried per snapshot.
pub const MAX_SNAPSHOT_HATS: usize = 4;
/// Maximum number of axes carried per snapshot.
pub const MAX_SNAPSHOT_AXES: usize = 8;

/// Complete state of one device at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// Display name of the device.
    pub name: String,
    /// Backend index of the device.
    pub index: usize,
    /// Held state of each button.
    pub buttons: Vec<bool>,
    /// Direction decomposition of each hat.
    pub hats: Vec<HatDirections>,
    /// Normalized position of each axis.
    pub axes: Vec<f32>,
}

impl DeviceSnapshot {
    /// Reads every button, hat and axis of `device`, truncated to the snapshot maxima.
    #[must_use]
    pub fn capture<D: RawDevice + ?Sized>(
        name: &str,
        index: usize,
        device: &D,
        deadzone: &Deadzone,
    ) -> Self {
        let buttons = (0..device.button_count().min(MAX_SNAPSHOT_BUTTONS))
            .map(|b| device.button(b))
            .collect();
        let hats = (0..device.hat_count().min(MAX_SNAPSHOT_HATS))
            .map(|h| HatDirections::from_raw(device.hat(h)))
            .collect();
        let axes = (0..device.axis_count().min(MAX_SNAPSHOT_AXES))
            .map(|a| deadzone.normalize(device.axis(a)))
            .collect();

        Self {
            name: name.to_string(),
            index,
            buttons,
            hats,
            axes,
        }
    }

    /// Overlays the value carried by `event` on top of the captured state.
    ///
    /// Indices beyond the snapshot maxima are ignored.
    pub fn apply_event(&mut self, event: &JoystickEvent, deadzone: &Deadzone) {
        match *event {
            JoystickEvent::ButtonDown { button, .. } => {
                if let Some(slot) = self.buttons.get_mut(button) {
                    *slot = true;
                }
            }
            JoystickEvent::ButtonUp { button, .. } => {
                if let Some(slot) = self.buttons.get_mut(button) {
                    *slot = false;
                }
            }
            JoystickEvent::AxisMotion { axis, value, .. } => {
                if let Some(slot) = self.axes.get_mut(axis) {
                    *slot = deadzone.normalize(value);
                }
            }
            JoystickEvent::HatMotion { hat, value, .. } => {
                if let Some(slot) = self.hats.get_mut(hat) {
                    *slot = HatDirections::from_raw(value);
                }
            }
            JoystickEvent::BallMotion { .. } | JoystickEvent::Other => {}
        }
    }
}

/// Capability interface a host registers to receive full device state.
///
/// [`InputConsumer::process_gamepad`] is called once per device per polling
/// tick and once per relevant event. The per-event hooks default to no-ops.
#[cfg_attr(test, mockall::automock)]
pub trait InputConsumer {
    /// Receives the complete state of one device.
    fn process_gamepad(&mut self, snapshot: &DeviceSnapshot);

    /// A button changed state on the event path.
    fn process_button(&mut self, _name: &str, _device: usize, _button: usize, _pressed: bool) {}

    /// An axis moved on the event path; `value` is normalized.
    fn process_axis(&mut self, _name: &str, _device: usize, _axis: usize, _value: f32) {}

    /// A hat moved on the event path.
    fn process_hat(&mut self, _name: &str, _device: usize, _hat: usize, _directions: HatDirections) {}
}
