//! # Device Table Module
//!
//! Ownership of the currently opened joysticks and their display names.
//!
//! The table is never partially replaced: [`DeviceTable::acquire`] opens every
//! connected device, and [`DeviceTable::release`] closes all of them and stops
//! the underlying device subsystem. Enumeration itself is delegated to a
//! [`DeviceBackend`], so the same table drives real hardware and test fakes.

use tracing::{debug, error, info, warn};

use crate::error::{ArbiterError, Result};

/// Maximum number of axes tracked per device; further axes are dropped.
pub const MAX_AXES: usize = 64;

/// Live raw-sample source for one opened joystick.
///
/// All reads are synchronous, non-blocking reads of state latched by the last
/// [`RawDevice::refresh`] call.
pub trait RawDevice {
    /// Number of buttons the device exposes.
    fn button_count(&self) -> usize;

    /// Number of hats the device exposes.
    fn hat_count(&self) -> usize;

    /// Number of analog axes the device exposes.
    fn axis_count(&self) -> usize;

    /// Whether button `index` (0-based) is held.
    fn button(&self, index: usize) -> bool;

    /// Raw bitmask of hat `index` (0-based), see [`crate::controller::hat`].
    fn hat(&self, index: usize) -> u8;

    /// Raw sample of axis `index` (0-based) in the 16-bit signed range.
    fn axis(&self, index: usize) -> i32;

    /// Latches the driver's buffered state so subsequent reads see it.
    fn refresh(&mut self) {}
}

/// Device acquisition boundary.
///
/// Enumerates connected joysticks and owns the lifetime of the platform's
/// device subsystem.
pub trait DeviceBackend {
    /// Device handle type produced by [`DeviceBackend::open`].
    type Device: RawDevice;

    /// Starts (or restarts) the device subsystem.
    ///
    /// # Errors
    ///
    /// Returns `SubsystemUnavailable` if the platform cannot provide devices.
    fn init_subsystem(&mut self) -> Result<()>;

    /// Requests a stop of the device subsystem.
    fn quit_subsystem(&mut self);

    /// Whether the device subsystem reports itself running.
    fn is_initialized(&self) -> bool;

    /// Number of connected devices.
    fn device_count(&self) -> usize;

    /// Display name of device `index`, if it has one.
    fn device_name(&self, index: usize) -> Option<String>;

    /// Opens device `index`, returning `None` if it cannot be opened.
    fn open(&mut self, index: usize) -> Option<Self::Device>;

    /// Enables or disables driver-initiated event delivery.
    fn set_event_delivery(&mut self, enabled: bool);
}

/// One table entry: a device index with its name and, if it opened, its handle.
#[derive(Debug)]
pub struct DeviceSlot<D> {
    index: usize,
    name: String,
    device: Option<D>,
}

impl<D> DeviceSlot<D> {
    /// Backend index of the device.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Display name; empty if the device failed to open.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opened device handle.
    #[must_use]
    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }
}

/// The set of currently opened joysticks.
///
/// # Thread Safety
///
/// `DeviceTable` is not thread-safe. Acquisition, release and reads must be
/// serialized by the owner.
#[derive(Debug)]
pub struct DeviceTable<D> {
    slots: Vec<DeviceSlot<D>>,
}

impl<D> Default for DeviceTable<D> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<D: RawDevice> DeviceTable<D> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens every connected device.
    ///
    /// Devices whose name contains any of `excluded_names` are skipped
    /// outright. Devices that fail to open keep a slot with an empty name.
    /// Driver-initiated event delivery is disabled afterwards, since state is
    /// consumed by explicit query.
    ///
    /// # Errors
    ///
    /// Returns `SubsystemUnavailable` if the backend cannot be started; the
    /// table is left empty.
    pub fn acquire<B>(&mut self, backend: &mut B, excluded_names: &[String]) -> Result<()>
    where
        B: DeviceBackend<Device = D>,
    {
        if let Err(e) = backend.init_subsystem() {
            error!("(Re)start joystick subsystem failed: {}", e);
            self.slots.clear();
            return Err(e);
        }

        // Any open ones? Close them before re-enumerating.
        self.slots.clear();

        for index in 0..backend.device_count() {
            let name = backend.device_name(index).unwrap_or_default();

            if let Some(pattern) = excluded_names
                .iter()
                .find(|pattern| !pattern.is_empty() && name.contains(pattern.as_str()))
            {
                info!("Ignoring joystick: {} (matches \"{}\")", name, pattern);
                continue;
            }

            match backend.open(index) {
                Some(device) => {
                    info!("Enabled joystick: {}", name);
                    info!(
                        "Details: Total Axis: {} Total Hats: {} Total Buttons: {}",
                        device.axis_count(),
                        device.hat_count(),
                        device.button_count()
                    );
                    if device.axis_count() > MAX_AXES {
                        warn!(
                            "Joystick {} reports {} axes; only the first {} are used",
                            name,
                            device.axis_count(),
                            MAX_AXES
                        );
                    }
                    self.slots.push(DeviceSlot {
                        index,
                        name,
                        device: Some(device),
                    });
                }
                None => {
                    debug!("Could not open joystick {} ({})", index, name);
                    self.slots.push(DeviceSlot {
                        index,
                        name: String::new(),
                        device: None,
                    });
                }
            }
        }

        backend.set_event_delivery(false);
        Ok(())
    }

    /// Closes all devices, clears the name table and stops the subsystem.
    ///
    /// Safe to call with no devices open.
    ///
    /// # Errors
    ///
    /// Returns `SubsystemStopFailed` if the backend still reports itself
    /// initialized after the stop request.
    pub fn release<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: DeviceBackend<Device = D>,
    {
        self.slots.clear();

        backend.quit_subsystem();
        if backend.is_initialized() {
            error!("Stop joystick subsystem failed");
            return Err(ArbiterError::SubsystemStopFailed);
        }
        Ok(())
    }

    /// Latches buffered state on every opened device.
    pub fn refresh(&mut self) {
        for device in self.slots.iter_mut().filter_map(|slot| slot.device.as_mut()) {
            device.refresh();
        }
    }

    /// Number of slots, including devices that failed to open.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in enumeration order.
    #[must_use]
    pub fn slots(&self) -> &[DeviceSlot<D>] {
        &self.slots
    }

    /// Display names in enumeration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().map(DeviceSlot::name)
    }

    /// Opened devices in enumeration order, with their backend index and name.
    pub fn opened(&self) -> impl Iterator<Item = (usize, &str, &D)> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.device.as_ref().map(|d| (slot.index, slot.name.as_str(), d)))
    }

    /// Looks up the slot holding backend index `index`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceOutOfRange` if no slot carries that index.
    pub fn slot(&self, index: usize) -> Result<&DeviceSlot<D>> {
        self.slots
            .iter()
            .find(|slot| slot.index == index)
            .ok_or(ArbiterError::DeviceOutOfRange {
                device: index,
                count: self.slots.len(),
            })
    }

    /// Looks up the opened device holding backend index `index`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceOutOfRange` if no slot carries that index or the device
    /// failed to open.
    pub fn opened_device(&self, index: usize) -> Result<(&str, &D)> {
        let slot = self.slot(index)?;
        slot.device
            .as_ref()
            .map(|device| (slot.name.as_str(), device))
            .ok_or(ArbiterError::DeviceOutOfRange {
                device: index,
                count: self.slots.len(),
            })
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared, mutable state of one fake joystick
    #[derive(Debug, Default)]
    pub struct FakeState {
        pub buttons: Vec<bool>,
        pub hats: Vec<u8>,
        pub axes: Vec<i32>,
        pub refreshes: usize,
    }

    /// Test-side handle used to move sticks and press buttons
    #[derive(Debug, Clone)]
    pub struct FakeJoystick {
        pub name: String,
        pub state: Arc<Mutex<FakeState>>,
    }

    impl FakeJoystick {
        pub fn press(&self, button: usize, pressed: bool) {
            self.state.lock().unwrap().buttons[button] = pressed;
        }

        pub fn set_hat(&self, hat: usize, raw: u8) {
            self.state.lock().unwrap().hats[hat] = raw;
        }

        pub fn set_axis(&self, axis: usize, raw: i32) {
            self.state.lock().unwrap().axes[axis] = raw;
        }

        pub fn refreshes(&self) -> usize {
            self.state.lock().unwrap().refreshes
        }
    }

    /// Opened fake joystick
    #[derive(Debug)]
    pub struct FakeDevice {
        state: Arc<Mutex<FakeState>>,
    }

    impl RawDevice for FakeDevice {
        fn button_count(&self) -> usize {
            self.state.lock().unwrap().buttons.len()
        }

        fn hat_count(&self) -> usize {
            self.state.lock().unwrap().hats.len()
        }

        fn axis_count(&self) -> usize {
            self.state.lock().unwrap().axes.len()
        }

        fn button(&self, index: usize) -> bool {
            self.state.lock().unwrap().buttons.get(index).copied().unwrap_or(false)
        }

        fn hat(&self, index: usize) -> u8 {
            self.state.lock().unwrap().hats.get(index).copied().unwrap_or(0)
        }

        fn axis(&self, index: usize) -> i32 {
            self.state.lock().unwrap().axes.get(index).copied().unwrap_or(0)
        }

        fn refresh(&mut self) {
            self.state.lock().unwrap().refreshes += 1;
        }
    }

    /// Fake device subsystem for testing
    #[derive(Debug, Default)]
    pub struct FakeBackend {
        pub joysticks: Vec<FakeJoystick>,
        pub initialized: bool,
        pub fail_init: bool,
        pub fail_quit: bool,
        pub unopenable: Vec<usize>,
        pub event_delivery: Option<bool>,
        pub init_calls: usize,
        pub quit_calls: usize,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Plugs in a joystick and returns the handle used to drive it
        pub fn plug(&mut self, name: &str, buttons: usize, hats: usize, axes: usize) -> FakeJoystick {
            let joystick = FakeJoystick {
                name: name.to_string(),
                state: Arc::new(Mutex::new(FakeState {
                    buttons: vec![false; buttons],
                    hats: vec![0; hats],
                    axes: vec![0; axes],
                    refreshes: 0,
                })),
            };
            self.joysticks.push(joystick.clone());
            joystick
        }
    }

    impl DeviceBackend for FakeBackend {
        type Device = FakeDevice;

        fn init_subsystem(&mut self) -> Result<()> {
            self.init_calls += 1;
            if self.fail_init {
                return Err(ArbiterError::SubsystemUnavailable("fake init failure".to_string()));
            }
            self.initialized = true;
            Ok(())
        }

        fn quit_subsystem(&mut self) {
            self.quit_calls += 1;
            if !self.fail_quit {
                self.initialized = false;
            }
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }

        fn device_count(&self) -> usize {
            self.joysticks.len()
        }

        fn device_name(&self, index: usize) -> Option<String> {
            self.joysticks.get(index).map(|j| j.name.clone())
        }

        fn open(&mut self, index: usize) -> Option<FakeDevice> {
            if self.unopenable.contains(&index) {
                return None;
            }
            self.joysticks.get(index).map(|j| FakeDevice {
                state: Arc::clone(&j.state),
            })
        }

        fn set_event_delivery(&mut self, enabled: bool) {
            self.event_delivery = Some(enabled);
        }
    }
}
