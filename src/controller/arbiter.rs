//! # Arbitration Module
//!
//! Reduces the signals of every opened joystick to at most one active button,
//! one active hat and one active axis.
//!
//! ## Precedence
//!
//! | Class  | Rule | Priority |
//! |--------|------|----------|
//! | Button | First held button, devices and buttons in index order | 1 |
//! | Hat    | First non-centered hat, devices and hats in index order | 2 |
//! | Axis   | Greatest deviation beyond the deadzone, across all devices | 3 |
//!
//! The axis winner is computed on every pass even when a button or hat won,
//! so axis state never goes stale; consumers decide which class to prefer.
//!
//! ## Ingestion
//!
//! [`Arbiter::poll`] sweeps every device once per frame.
//! [`Arbiter::apply_event`] applies one discrete event for one device.
//! Both feed the same state and share press timestamps.

use tracing::debug;

use super::device::{DeviceTable, RawDevice, MAX_AXES};
use super::event::JoystickEvent;
use super::hat::HAT_CENTERED;
use super::normalize::{Deadzone, MAX_AXIS_AMOUNT, MIN_AXIS_AMOUNT};
use super::repeat::PressStamp;
use crate::error::{ArbiterError, Result};

/// The active member of the button or hat class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// Device index the activation came from.
    pub device: usize,
    /// 1-based button or hat id.
    pub id: u32,
    /// When the class went active.
    pub press: PressStamp,
}

/// The most active axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisActivation {
    /// Device index owning the axis.
    pub device: usize,
    /// 1-based axis id.
    pub id: u32,
}

/// Stored raw samples for one device's axes.
#[derive(Debug, Clone)]
struct AxisBank {
    device: usize,
    count: usize,
    samples: [i32; MAX_AXES],
}

impl AxisBank {
    fn new(device: usize) -> Self {
        Self {
            device,
            count: 0,
            samples: [0; MAX_AXES],
        }
    }
}

/// Arbitration state shared by the polling and event paths.
///
/// # Thread Safety
///
/// `Arbiter` is not thread-safe. Both ingestion paths must run on the same
/// thread or be serialized by the owner.
///
/// # Examples
///
/// ```
/// use joystick_arbiter::controller::arbiter::Arbiter;
/// use joystick_arbiter::controller::event::JoystickEvent;
/// use joystick_arbiter::controller::normalize::Deadzone;
///
/// let mut arbiter = Arbiter::new();
/// let deadzone = Deadzone::new(0.2);
///
/// arbiter.apply_event(&JoystickEvent::ButtonDown { device: 0, button: 2 }, &deadzone, 0, 100).unwrap();
/// assert_eq!(arbiter.button().map(|a| a.id), Some(3));
///
/// arbiter.apply_event(&JoystickEvent::ButtonUp { device: 0, button: 2 }, &deadzone, 0, 150).unwrap();
/// assert!(arbiter.button().is_none());
/// ```
#[derive(Debug, Default)]
pub struct Arbiter {
    button: Option<Activation>,
    hat: Option<Activation>,
    hat_position: u8,
    axis: Option<AxisActivation>,
    banks: Vec<AxisBank>,
    last_device: Option<usize>,
    next_serial: u64,
}

impl Arbiter {
    /// Creates an arbiter with every class inactive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active button, if any.
    #[must_use]
    pub fn button(&self) -> Option<Activation> {
        self.button
    }

    /// Active hat and its raw position bitmask, if any.
    #[must_use]
    pub fn hat(&self) -> Option<(Activation, u8)> {
        self.hat.map(|hat| (hat, self.hat_position))
    }

    /// Most active axis, if any axis is outside the deadzone.
    #[must_use]
    pub fn axis(&self) -> Option<AxisActivation> {
        self.axis
    }

    /// Device that produced the most recent winning signal.
    #[must_use]
    pub fn last_device(&self) -> Option<usize> {
        self.last_device
    }

    /// Stored raw sample of 1-based axis `axis_id` on `device`.
    #[must_use]
    pub fn sample(&self, device: usize, axis_id: u32) -> Option<i32> {
        let slot = usize::try_from(axis_id).ok()?.checked_sub(1)?;
        self.banks
            .iter()
            .find(|bank| bank.device == device)
            .and_then(|bank| bank.samples.get(slot).copied())
    }

    /// Returns every class to neutral and forgets stored samples.
    pub fn reset(&mut self) {
        self.button = None;
        self.hat = None;
        self.hat_position = HAT_CENTERED;
        self.axis = None;
        self.banks.clear();
        self.last_device = None;
    }

    /// Sweeps every opened device once.
    ///
    /// Buttons win first, then hats, each taking the first qualifying signal
    /// in device and index order. Axes of every device are then stored and
    /// the greatest deviation selected.
    pub fn poll<D: RawDevice>(&mut self, devices: &DeviceTable<D>, deadzone: &Deadzone, now: u64) {
        let held_button = devices.opened().find_map(|(index, _, device)| {
            (0..device.button_count())
                .find(|&b| device.button(b))
                .map(|b| (index, b))
        });

        let moved_hat = devices.opened().find_map(|(index, _, device)| {
            (0..device.hat_count()).find_map(|h| {
                let value = device.hat(h);
                (value != HAT_CENTERED).then_some((index, h, value))
            })
        });

        self.banks
            .retain(|bank| devices.opened().any(|(index, _, _)| index == bank.device));
        for (index, _, device) in devices.opened() {
            let count = device.axis_count().min(MAX_AXES);
            let bank = self.bank_mut(index);
            bank.count = count;
            for (a, sample) in bank.samples.iter_mut().enumerate().take(count) {
                *sample = device.axis(a);
            }
        }
        self.select_axis(deadzone);

        self.settle_hat(moved_hat, now);
        self.settle_button(held_button, now);
    }

    /// Applies one discrete event from one device.
    ///
    /// `axis_count` is the capability count of the originating device, used
    /// to bound the axis selection. Ball motion and unknown events are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AxisOutOfRange` for axis events beyond [`MAX_AXES`]; no state
    /// is changed in that case.
    pub fn apply_event(
        &mut self,
        event: &JoystickEvent,
        deadzone: &Deadzone,
        axis_count: usize,
        now: u64,
    ) -> Result<()> {
        match *event {
            JoystickEvent::ButtonDown { device, button } => {
                let id = to_id(button);
                self.button = Some(Activation {
                    device,
                    id,
                    press: self.next_press(now),
                });
                self.last_device = Some(device);
                debug!("Joystick {} button {} Down", device, id);
            }

            JoystickEvent::ButtonUp { device, button } => {
                self.button = None;
                debug!("Joystick {} button {} Up", device, to_id(button));
            }

            JoystickEvent::AxisMotion { device, axis, value } => {
                if axis >= MAX_AXES {
                    return Err(ArbiterError::AxisOutOfRange {
                        axis: axis + 1,
                        max: MAX_AXES,
                    });
                }

                let value = value.clamp(MIN_AXIS_AMOUNT, MAX_AXIS_AMOUNT);
                let bank = self.bank_mut(device);
                bank.count = bank.count.max(axis_count.min(MAX_AXES)).max(axis + 1);
                // Zero is an explicit clear of the stored sample
                bank.samples[axis] = value;

                self.last_device = Some(device);
                self.select_axis(deadzone);
                debug!("Joystick {} Axis {} Amount {}", device, axis + 1, value);
            }

            JoystickEvent::HatMotion { device, hat, value } => {
                self.hat_position = value;
                self.last_device = Some(device);
                if value == HAT_CENTERED {
                    self.hat = None;
                    debug!("Joystick {} hat {} Centered", device, to_id(hat));
                } else {
                    self.hat = Some(Activation {
                        device,
                        id: to_id(hat),
                        press: self.next_press(now),
                    });
                    debug!("Joystick {} hat {} Down with position {}", device, to_id(hat), value);
                }
            }

            JoystickEvent::BallMotion { .. } | JoystickEvent::Other => {}
        }

        Ok(())
    }

    fn next_press(&mut self, now: u64) -> PressStamp {
        self.next_serial += 1;
        PressStamp {
            started_at: now,
            serial: self.next_serial,
        }
    }

    fn bank_mut(&mut self, device: usize) -> &mut AxisBank {
        let position = match self.banks.iter().position(|bank| bank.device == device) {
            Some(position) => position,
            None => {
                self.banks.push(AxisBank::new(device));
                self.banks.len() - 1
            }
        };
        &mut self.banks[position]
    }

    /// Picks the stored sample with the greatest magnitude beyond the deadzone.
    ///
    /// Ties go to the earliest device and axis.
    fn select_axis(&mut self, deadzone: &Deadzone) {
        let mut best: Option<(AxisActivation, i32)> = None;

        for bank in &self.banks {
            for (a, &sample) in bank.samples.iter().enumerate().take(bank.count) {
                let magnitude = sample.saturating_abs();
                if !deadzone.exceeds(sample) {
                    continue;
                }
                if best.map_or(true, |(_, max)| magnitude > max) {
                    best = Some((
                        AxisActivation {
                            device: bank.device,
                            id: to_id(a),
                        },
                        magnitude,
                    ));
                }
            }
        }

        self.axis = best.map(|(axis, _)| axis);
        if let Some(axis) = self.axis {
            self.last_device = Some(axis.device);
        }
    }

    fn settle_button(&mut self, held: Option<(usize, usize)>, now: u64) {
        match (held, self.button.as_mut()) {
            (None, None) => {}
            (None, Some(active)) => {
                debug!("Joystick {} button {} Up", active.device, active.id);
                self.button = None;
            }
            (Some((device, b)), Some(active)) => {
                let id = to_id(b);
                if active.id != id || active.device != device {
                    debug!("Joystick {} button {} Down", device, id);
                    active.id = id;
                    active.device = device;
                }
                self.last_device = Some(device);
            }
            (Some((device, b)), None) => {
                let id = to_id(b);
                debug!("Joystick {} button {} Down", device, id);
                self.button = Some(Activation {
                    device,
                    id,
                    press: self.next_press(now),
                });
                self.last_device = Some(device);
            }
        }
    }

    fn settle_hat(&mut self, moved: Option<(usize, usize, u8)>, now: u64) {
        match (moved, self.hat.as_mut()) {
            (None, None) => {}
            (None, Some(active)) => {
                debug!("Joystick {} hat {} Centered", active.device, active.id);
                self.hat = None;
                self.hat_position = HAT_CENTERED;
            }
            (Some((device, h, value)), Some(active)) => {
                let id = to_id(h);
                if active.id != id || active.device != device {
                    debug!("Joystick {} hat {} Down", device, id);
                    active.id = id;
                    active.device = device;
                }
                self.hat_position = value;
                self.last_device = Some(device);
            }
            (Some((device, h, value)), None) => {
                let id = to_id(h);
                debug!("Joystick {} hat {} Down", device, id);
                self.hat = Some(Activation {
                    device,
                    id,
                    press: self.next_press(now),
                });
                self.hat_position = value;
                self.last_device = Some(device);
            }
        }
    }
}

/// Converts a 0-based index into a 1-based id.
fn to_id(index: usize) -> u32 {
    u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1))
}
