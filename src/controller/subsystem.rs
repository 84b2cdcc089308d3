//! # Input Subsystem Module
//!
//! The owning context for device acquisition, arbitration, repeat timing and
//! snapshot delivery.
//!
//! An [`InputSubsystem`] has two ingest entry points that feed the same state:
//!
//! - [`InputSubsystem::update`]: a polling sweep, called once per frame
//! - [`InputSubsystem::handle_event`]: a discrete event, called per hardware event
//!
//! Both also push full per-device snapshots to a registered [`InputConsumer`].
//! Queries ([`InputSubsystem::button`], [`InputSubsystem::hat`],
//! [`InputSubsystem::axis`], [`InputSubsystem::amount`]) read the arbitrated
//! state, optionally filtered through the repeat timers.
//!
//! ## Usage
//!
//! ```no_run
//! use joystick_arbiter::controller::clock::MonotonicClock;
//! use joystick_arbiter::controller::evdev_backend::EvdevBackend;
//! use joystick_arbiter::controller::subsystem::{InputSettings, InputSubsystem};
//!
//! let mut input = InputSubsystem::new(EvdevBackend::new(), MonotonicClock::new(), InputSettings::default());
//! input.set_enabled(true);
//!
//! loop {
//!     input.update();
//!     if let Some(button) = input.button(true) {
//!         println!("Button {} pressed", button);
//!     }
//! #   break;
//! }
//! ```

use tracing::{debug, error, info};

use super::arbiter::Arbiter;
use super::clock::Clock;
use super::device::{DeviceBackend, DeviceTable, RawDevice};
use super::event::JoystickEvent;
use super::hat::HatDirections;
use super::normalize::Deadzone;
use super::repeat::{RepeatPolicy, RepeatTimer};
use super::snapshot::{DeviceSnapshot, InputConsumer};
use crate::error::{ArbiterError, Result};

/// Number of polls between "enabled" status debug lines.
const STATUS_LOG_INTERVAL_POLLS: u64 = 60;

/// Startup settings for an [`InputSubsystem`].
#[derive(Debug, Clone, Default)]
pub struct InputSettings {
    /// Deadzone as a fraction of the raw axis range.
    pub deadzone: f32,
    /// Repeat timing for button and hat queries.
    pub repeat: RepeatPolicy,
    /// Devices whose name contains any of these substrings are skipped.
    pub excluded_names: Vec<String>,
}

/// Owning context for joystick input.
///
/// Starts disabled; call [`InputSubsystem::set_enabled`] to acquire devices.
///
/// # Thread Safety
///
/// Not thread-safe. The polling and event paths must run on one thread or be
/// serialized by the caller.
pub struct InputSubsystem<B: DeviceBackend, C: Clock> {
    backend: B,
    clock: C,
    devices: DeviceTable<B::Device>,
    arbiter: Arbiter,
    deadzone: Deadzone,
    repeat: RepeatPolicy,
    button_timer: RepeatTimer,
    hat_timer: RepeatTimer,
    excluded_names: Vec<String>,
    consumer: Option<Box<dyn InputConsumer>>,
    enabled: bool,
    polls: u64,
}

impl<B: DeviceBackend, C: Clock> std::fmt::Debug for InputSubsystem<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSubsystem")
            .field("enabled", &self.enabled)
            .field("devices", &self.devices.len())
            .field("deadzone", &self.deadzone)
            .field("repeat", &self.repeat)
            .field("consumer", &self.consumer.is_some())
            .finish_non_exhaustive()
    }
}

impl<B: DeviceBackend, C: Clock> InputSubsystem<B, C> {
    /// Creates a disabled subsystem with no devices open.
    pub fn new(backend: B, clock: C, settings: InputSettings) -> Self {
        Self {
            backend,
            clock,
            devices: DeviceTable::new(),
            arbiter: Arbiter::new(),
            deadzone: Deadzone::new(settings.deadzone),
            repeat: settings.repeat,
            button_timer: RepeatTimer::new(),
            hat_timer: RepeatTimer::new(),
            excluded_names: settings.excluded_names,
            consumer: None,
            enabled: false,
            polls: 0,
        }
    }

    // ==================== Configuration ====================

    /// Whether device acquisition and processing are enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables input.
    ///
    /// Enabling acquires every device; disabling releases them all. Setting
    /// the current state again does nothing. Failures are logged and leave
    /// the subsystem with an empty device table.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.enabled = true;
            info!("Joystick input enabled");
            if let Err(e) = self.acquire() {
                error!("Joystick acquisition failed: {}", e);
            }
        } else if !enabled && self.enabled {
            if let Err(e) = self.release() {
                error!("Joystick release failed: {}", e);
            }
            self.enabled = false;
            info!("Joystick input disabled");
        }
    }

    /// Sets the deadzone fraction, clamped to 0.0..=1.0.
    ///
    /// Returns the fraction actually applied.
    pub fn set_deadzone(&mut self, fraction: f32) -> f32 {
        self.deadzone = Deadzone::new(fraction);
        debug!(
            "Deadzone set to {} (threshold {})",
            self.deadzone.fraction(),
            self.deadzone.threshold()
        );
        self.deadzone.fraction()
    }

    /// Current deadzone.
    #[must_use]
    pub fn deadzone(&self) -> Deadzone {
        self.deadzone
    }

    /// Registers the consumer receiving full device snapshots, replacing any previous one.
    pub fn set_consumer(&mut self, consumer: Box<dyn InputConsumer>) {
        self.consumer = Some(consumer);
    }

    /// Removes and returns the registered consumer.
    pub fn take_consumer(&mut self) -> Option<Box<dyn InputConsumer>> {
        self.consumer.take()
    }

    // ==================== Device Table ====================

    /// Opens every connected device if input is enabled.
    ///
    /// # Errors
    ///
    /// Returns `SubsystemUnavailable` if the backend cannot be started.
    pub fn acquire(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.devices.acquire(&mut self.backend, &self.excluded_names)
    }

    /// Closes every device, returns all activation state to neutral and
    /// stops the device subsystem.
    ///
    /// Safe to call at any time, including with no devices open.
    ///
    /// # Errors
    ///
    /// Returns `SubsystemStopFailed` if the backend does not stop cleanly.
    pub fn release(&mut self) -> Result<()> {
        self.arbiter.reset();
        self.button_timer.reset();
        self.hat_timer.reset();
        self.devices.release(&mut self.backend)
    }

    /// Releases and re-acquires every device.
    ///
    /// # Errors
    ///
    /// A release failure aborts before acquisition is attempted. Acquisition
    /// failures are returned as well.
    pub fn reinitialize(&mut self) -> Result<()> {
        self.release()?;
        self.acquire()
    }

    /// The device table.
    #[must_use]
    pub fn devices(&self) -> &DeviceTable<B::Device> {
        &self.devices
    }

    /// The acquisition backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the acquisition backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ==================== Ingest ====================

    /// Polling sweep: latches every device, pushes snapshots and arbitrates.
    pub fn update(&mut self) {
        self.polls = self.polls.wrapping_add(1);
        if self.polls % STATUS_LOG_INTERVAL_POLLS == 0 {
            debug!(
                "Joystick input events are {}",
                if self.enabled { "enabled" } else { "disabled" }
            );
        }

        if !self.enabled || self.devices.is_empty() {
            return;
        }

        self.devices.refresh();

        if let Some(consumer) = self.consumer.as_mut() {
            for (index, name, device) in self.devices.opened() {
                let snapshot = DeviceSnapshot::capture(name, index, device, &self.deadzone);
                consumer.process_gamepad(&snapshot);
            }
        }

        let now = self.clock.now_ms();
        self.arbiter.poll(&self.devices, &self.deadzone, now);
    }

    /// Event path: applies one discrete event and forwards it to the consumer.
    ///
    /// The bundled binary only polls; this entry point is fed by a host event
    /// pump that translates its platform's joystick notifications into
    /// [`JoystickEvent`]s and hands them over on the polling thread.
    ///
    /// Events from devices not in the table, and events naming a button, hat
    /// or axis the device does not have, are logged and dropped. Axes the
    /// device has but that lie beyond [`MAX_AXES`](super::device::MAX_AXES)
    /// are not arbitrated but still reach the consumer. Ball motion and
    /// unknown events are ignored.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joystick_arbiter::controller::clock::MonotonicClock;
    /// use joystick_arbiter::controller::evdev_backend::EvdevBackend;
    /// use joystick_arbiter::controller::event::JoystickEvent;
    /// use joystick_arbiter::controller::subsystem::{InputSettings, InputSubsystem};
    ///
    /// let mut input = InputSubsystem::new(EvdevBackend::new(), MonotonicClock::new(), InputSettings::default());
    /// input.set_enabled(true);
    ///
    /// // One notification from the host's event pump
    /// input.handle_event(&JoystickEvent::ButtonDown { device: 0, button: 0 });
    /// assert_eq!(input.button(false), Some(1));
    /// ```
    pub fn handle_event(&mut self, event: &JoystickEvent) {
        if !self.enabled {
            return;
        }
        if !event.is_relevant() {
            return;
        }
        let Some(index) = event.device() else {
            return;
        };

        let (name, device) = match self.devices.opened_device(index) {
            Ok(found) => found,
            Err(e) => {
                error!("Dropping joystick event: {}", e);
                return;
            }
        };

        if let Err(e) = check_component(event, device) {
            error!("Dropping joystick event: {}", e);
            return;
        }

        let now = self.clock.now_ms();
        if let Err(e) = self
            .arbiter
            .apply_event(event, &self.deadzone, device.axis_count(), now)
        {
            error!("Joystick event not arbitrated: {}", e);
        }

        let Some(consumer) = self.consumer.as_mut() else {
            debug!("No input consumer registered");
            return;
        };

        let mut snapshot = DeviceSnapshot::capture(name, index, device, &self.deadzone);
        snapshot.apply_event(event, &self.deadzone);
        consumer.process_gamepad(&snapshot);

        match *event {
            JoystickEvent::ButtonDown { button, .. } => {
                consumer.process_button(name, index, button, true);
            }
            JoystickEvent::ButtonUp { button, .. } => {
                consumer.process_button(name, index, button, false);
            }
            JoystickEvent::AxisMotion { axis, value, .. } => {
                consumer.process_axis(name, index, axis, self.deadzone.normalize(value));
            }
            JoystickEvent::HatMotion { hat, value, .. } => {
                consumer.process_hat(name, index, hat, HatDirections::from_raw(value));
            }
            JoystickEvent::BallMotion { .. } | JoystickEvent::Other => {}
        }
    }

    // ==================== Queries ====================

    /// Active button id (1-based).
    ///
    /// With `consider_repeat`, a held button is reported on the first query
    /// after the press, then suppressed until the initial delay elapses,
    /// then reported once per repeat interval.
    pub fn button(&mut self, consider_repeat: bool) -> Option<u32> {
        if !self.enabled {
            return None;
        }
        let active = self.arbiter.button()?;
        if !consider_repeat {
            return Some(active.id);
        }

        let now = self.clock.now_ms();
        self.button_timer
            .should_report(&active.press, now, &self.repeat)
            .then_some(active.id)
    }

    /// Active hat id (1-based) and raw position bitmask.
    ///
    /// `consider_repeat` behaves as for [`InputSubsystem::button`].
    pub fn hat(&mut self, consider_repeat: bool) -> Option<(u32, u8)> {
        if !self.enabled {
            return None;
        }
        let (active, position) = self.arbiter.hat()?;
        if !consider_repeat {
            return Some((active.id, position));
        }

        let now = self.clock.now_ms();
        self.hat_timer
            .should_report(&active.press, now, &self.repeat)
            .then_some((active.id, position))
    }

    /// Id (1-based) of the axis with the greatest deviation beyond the deadzone.
    #[must_use]
    pub fn axis(&self) -> Option<u32> {
        if !self.enabled {
            return None;
        }
        self.arbiter.axis().map(|axis| axis.id)
    }

    /// Normalized position of 1-based axis `axis_id`.
    ///
    /// Reads the device owning the most active axis, falling back to the
    /// device of the most recent winning signal. Unknown axes read 0.0.
    #[must_use]
    pub fn amount(&self, axis_id: u32) -> f32 {
        let device = self
            .arbiter
            .axis()
            .map(|axis| axis.device)
            .or_else(|| self.arbiter.last_device());

        device
            .and_then(|device| self.arbiter.sample(device, axis_id))
            .map_or(0.0, |raw| self.deadzone.normalize(raw))
    }

    /// Normalized position of 1-based axis `axis_id` on a specific device.
    #[must_use]
    pub fn amount_on(&self, device: usize, axis_id: u32) -> f32 {
        self.arbiter
            .sample(device, axis_id)
            .map_or(0.0, |raw| self.deadzone.normalize(raw))
    }
}

/// Checks that the button, hat or axis named by `event` exists on `device`.
fn check_component<D: RawDevice + ?Sized>(event: &JoystickEvent, device: &D) -> Result<()> {
    match *event {
        JoystickEvent::ButtonDown { button, .. } | JoystickEvent::ButtonUp { button, .. }
            if button >= device.button_count() =>
        {
            Err(ArbiterError::ButtonOutOfRange {
                button: button + 1,
                count: device.button_count(),
            })
        }
        JoystickEvent::HatMotion { hat, .. } if hat >= device.hat_count() => {
            Err(ArbiterError::HatOutOfRange {
                hat: hat + 1,
                count: device.hat_count(),
            })
        }
        JoystickEvent::AxisMotion { axis, .. } if axis >= device.axis_count() => {
            Err(ArbiterError::AxisOutOfRange {
                axis: axis + 1,
                max: device.axis_count(),
            })
        }
        _ => Ok(()),
    }
}
