//! # Evdev Backend Module
//!
//! Linux joystick acquisition using the evdev interface.
//!
//! ## Device Detection
//!
//! Every `/dev/input/event*` node is opened in sorted order and kept if it
//! exposes joystick or gamepad buttons:
//! - `BTN_JOYSTICK` .. `BTN_DIGI` (0x120-0x13f)
//! - `BTN_TRIGGER_HAPPY` range (0x2c0-0x2ff)
//!
//! Keyboards and mice are skipped.
//!
//! ## Axes and Hats
//!
//! Absolute axes are rescaled from their reported min/max to the signed
//! 16-bit range. `ABS_HAT0X`..`ABS_HAT3Y` pairs are folded into hat bitmasks
//! instead of being reported as axes.

use evdev::{AbsoluteAxisType, Device, Key};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::device::{DeviceBackend, RawDevice};
use super::hat::hat_from_axes;
use super::normalize::MAX_AXIS_AMOUNT;
use crate::error::{ArbiterError, Result};

/// Default directory scanned for event nodes
const INPUT_DIR: &str = "/dev/input";

/// Key code ranges that identify a joystick or gamepad
const JOYSTICK_KEY_RANGES: [(u16, u16); 2] = [(0x120, 0x140), (0x2c0, 0x300)];

/// Key code ranges reported as buttons (includes BTN_MISC and BTN_MOUSE blocks)
const BUTTON_KEY_RANGES: [(u16, u16); 2] = [(0x100, 0x140), (0x2c0, 0x300)];

/// First and last hat axis codes
const ABS_HAT_FIRST: u16 = AbsoluteAxisType::ABS_HAT0X.0;
const ABS_HAT_LAST: u16 = AbsoluteAxisType::ABS_HAT3Y.0;

/// Number of hats evdev can describe
const MAX_EVDEV_HATS: u16 = 4;

/// Rescales a raw absolute value from `min..=max` to ±32767.
///
/// Degenerate ranges read as centered.
///
/// # Examples
///
/// ```
/// use joystick_arbiter::controller::evdev_backend::scale_abs;
///
/// assert_eq!(scale_abs(0, 0, 255), -32767);
/// assert_eq!(scale_abs(255, 0, 255), 32767);
/// assert_eq!(scale_abs(5, 5, 5), 0);
/// ```
#[must_use]
pub fn scale_abs(value: i32, min: i32, max: i32) -> i32 {
    if max <= min {
        return 0;
    }

    let span = i64::from(max) - i64::from(min);
    let offset = i64::from(value.clamp(min, max)) - i64::from(min);
    let full = 2 * i64::from(MAX_AXIS_AMOUNT);
    let scaled = offset * full / span - i64::from(MAX_AXIS_AMOUNT);

    scaled.clamp(-i64::from(MAX_AXIS_AMOUNT), i64::from(MAX_AXIS_AMOUNT)) as i32
}

fn in_ranges(code: u16, ranges: &[(u16, u16)]) -> bool {
    ranges.iter().any(|&(start, end)| code >= start && code < end)
}

fn is_hat_code(code: u16) -> bool {
    (ABS_HAT_FIRST..=ABS_HAT_LAST).contains(&code)
}

/// Whether an opened event node looks like a joystick
fn is_joystick(device: &Device) -> bool {
    device
        .supported_keys()
        .map_or(false, |keys| keys.iter().any(|key| in_ranges(key.code(), &JOYSTICK_KEY_RANGES)))
}

/// Joystick enumeration over `/dev/input`
#[derive(Debug)]
pub struct EvdevBackend {
    input_dir: PathBuf,
    candidates: Vec<(PathBuf, String)>,
    initialized: bool,
    event_delivery: bool,
}

impl Default for EvdevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevBackend {
    /// Creates a backend scanning `/dev/input`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_input_dir(INPUT_DIR)
    }

    /// Creates a backend scanning a custom directory.
    pub fn with_input_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            input_dir: dir.as_ref().to_path_buf(),
            candidates: Vec::new(),
            initialized: false,
            event_delivery: true,
        }
    }

    /// Paths of the joysticks found by the last start.
    pub fn device_paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.candidates.iter().map(|(path, _)| path.as_path())
    }

    /// Whether driver-initiated event delivery was last requested on.
    #[must_use]
    pub fn event_delivery(&self) -> bool {
        self.event_delivery
    }

    fn scan(&self) -> Result<Vec<(PathBuf, String)>> {
        if !self.input_dir.exists() {
            return Err(ArbiterError::SubsystemUnavailable(format!(
                "{} directory not found",
                self.input_dir.display()
            )));
        }

        let mut entries: Vec<_> = std::fs::read_dir(&self.input_dir)
            .map_err(|e| {
                ArbiterError::SubsystemUnavailable(format!(
                    "Failed to read {}: {}",
                    self.input_dir.display(),
                    e
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                ArbiterError::SubsystemUnavailable(format!("Failed to read directory entry: {}", e))
            })?;

        // Sorted so device indices are stable across restarts
        entries.sort_by_key(|entry| entry.path());

        let mut found = Vec::new();
        for entry in entries {
            let path = entry.path();
            let is_event_node = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.starts_with("event"));
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) if is_joystick(&device) => {
                    let name = device.name().unwrap_or_default().to_string();
                    debug!("Found joystick at {}: {}", path.display(), name);
                    found.push((path, name));
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Ok(found)
    }
}

impl DeviceBackend for EvdevBackend {
    type Device = EvdevJoystick;

    fn init_subsystem(&mut self) -> Result<()> {
        self.candidates = self.scan()?;
        self.initialized = true;
        info!("Found {} joystick(s) in {}", self.candidates.len(), self.input_dir.display());
        Ok(())
    }

    fn quit_subsystem(&mut self) {
        self.candidates.clear();
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn device_count(&self) -> usize {
        self.candidates.len()
    }

    fn device_name(&self, index: usize) -> Option<String> {
        self.candidates.get(index).map(|(_, name)| name.clone())
    }

    fn open(&mut self, index: usize) -> Option<EvdevJoystick> {
        let (path, _) = self.candidates.get(index)?;
        match Device::open(path) {
            Ok(device) => Some(EvdevJoystick::new(device)),
            Err(e) => {
                warn!("Failed to open {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set_event_delivery(&mut self, enabled: bool) {
        // Nodes are never grabbed, so this only records the request
        self.event_delivery = enabled;
        debug!("Joystick event delivery {}", if enabled { "enabled" } else { "disabled" });
    }
}

/// One opened evdev joystick with latched state
pub struct EvdevJoystick {
    device: Device,
    button_codes: Vec<u16>,
    axis_codes: Vec<u16>,
    hat_codes: Vec<(u16, u16)>,
    buttons: Vec<bool>,
    axes: Vec<i32>,
    hats: Vec<u8>,
}

impl std::fmt::Debug for EvdevJoystick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevJoystick")
            .field("name", &self.device.name())
            .field("buttons", &self.button_codes.len())
            .field("axes", &self.axis_codes.len())
            .field("hats", &self.hat_codes.len())
            .finish()
    }
}

impl EvdevJoystick {
    fn new(device: Device) -> Self {
        let button_codes: Vec<u16> = device
            .supported_keys()
            .map(|keys| {
                keys.iter()
                    .map(|key| key.code())
                    .filter(|&code| in_ranges(code, &BUTTON_KEY_RANGES))
                    .collect()
            })
            .unwrap_or_default();

        let abs_codes: Vec<u16> = device
            .supported_absolute_axes()
            .map(|axes| axes.iter().map(|axis| axis.0).collect())
            .unwrap_or_default();

        let axis_codes: Vec<u16> = abs_codes.iter().copied().filter(|&code| !is_hat_code(code)).collect();

        let hat_codes: Vec<(u16, u16)> = (0..MAX_EVDEV_HATS)
            .map(|hat| (ABS_HAT_FIRST + 2 * hat, ABS_HAT_FIRST + 2 * hat + 1))
            .filter(|(x, y)| abs_codes.contains(x) || abs_codes.contains(y))
            .collect();

        Self {
            buttons: vec![false; button_codes.len()],
            axes: vec![0; axis_codes.len()],
            hats: vec![0; hat_codes.len()],
            device,
            button_codes,
            axis_codes,
            hat_codes,
        }
    }

    /// Device node name, if the driver reports one.
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }
}

impl RawDevice for EvdevJoystick {
    fn button_count(&self) -> usize {
        self.button_codes.len()
    }

    fn hat_count(&self) -> usize {
        self.hat_codes.len()
    }

    fn axis_count(&self) -> usize {
        self.axis_codes.len()
    }

    fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    fn hat(&self, index: usize) -> u8 {
        self.hats.get(index).copied().unwrap_or(0)
    }

    fn axis(&self, index: usize) -> i32 {
        self.axes.get(index).copied().unwrap_or(0)
    }

    fn refresh(&mut self) {
        match self.device.get_key_state() {
            Ok(keys) => {
                for (held, &code) in self.buttons.iter_mut().zip(&self.button_codes) {
                    *held = keys.contains(Key::new(code));
                }
            }
            Err(e) => debug!("Key state read failed: {}", e),
        }

        let abs = match self.device.get_abs_state() {
            Ok(abs) => abs,
            Err(e) => {
                debug!("Axis state read failed: {}", e);
                return;
            }
        };

        for (sample, &code) in self.axes.iter_mut().zip(&self.axis_codes) {
            if let Some(info) = abs.get(usize::from(code)) {
                *sample = scale_abs(info.value, info.minimum, info.maximum);
            }
        }

        for (raw, &(x_code, y_code)) in self.hats.iter_mut().zip(&self.hat_codes) {
            let x = abs.get(usize::from(x_code)).map_or(0, |info| info.value);
            let y = abs.get(usize::from(y_code)).map_or(0, |info| info.value);
            *raw = hat_from_axes(x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scale_abs_endpoints() {
        assert_eq!(scale_abs(0, 0, 255), -MAX_AXIS_AMOUNT);
        assert_eq!(scale_abs(255, 0, 255), MAX_AXIS_AMOUNT);
        assert_eq!(scale_abs(-32768, -32768, 32767), -MAX_AXIS_AMOUNT);
        assert_eq!(scale_abs(32767, -32768, 32767), MAX_AXIS_AMOUNT);
    }

    #[test]
    fn test_scale_abs_center() {
        assert!(scale_abs(128, 0, 255).abs() < 300);
        assert_eq!(scale_abs(0, -32768, 32767), 0);
        assert_eq!(scale_abs(0, -1, 1), 0);
    }

    #[test]
    fn test_scale_abs_clamps_out_of_range() {
        assert_eq!(scale_abs(1000, 0, 255), MAX_AXIS_AMOUNT);
        assert_eq!(scale_abs(-1000, 0, 255), -MAX_AXIS_AMOUNT);
    }

    #[test]
    fn test_scale_abs_degenerate_range() {
        assert_eq!(scale_abs(10, 10, 10), 0);
        assert_eq!(scale_abs(10, 20, 10), 0);
    }

    #[test]
    fn test_hat_codes() {
        assert!(is_hat_code(AbsoluteAxisType::ABS_HAT0X.0));
        assert!(is_hat_code(AbsoluteAxisType::ABS_HAT3Y.0));
        assert!(!is_hat_code(AbsoluteAxisType::ABS_X.0));
        assert!(!is_hat_code(AbsoluteAxisType::ABS_RZ.0));
    }

    #[test]
    fn test_joystick_key_ranges() {
        assert!(in_ranges(Key::BTN_TRIGGER.code(), &JOYSTICK_KEY_RANGES));
        assert!(in_ranges(Key::BTN_SOUTH.code(), &JOYSTICK_KEY_RANGES));
        assert!(in_ranges(Key::BTN_TRIGGER_HAPPY1.code(), &JOYSTICK_KEY_RANGES));
        assert!(!in_ranges(Key::BTN_LEFT.code(), &JOYSTICK_KEY_RANGES));
        assert!(!in_ranges(Key::KEY_A.code(), &JOYSTICK_KEY_RANGES));
    }

    #[test]
    fn test_missing_input_dir_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let mut backend = EvdevBackend::with_input_dir(dir.path().join("missing"));

        let result = backend.init_subsystem();
        assert!(matches!(result, Err(ArbiterError::SubsystemUnavailable(_))));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_empty_input_dir_has_no_devices() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("event0"), b"not a device").unwrap();
        std::fs::write(dir.path().join("mouse0"), b"").unwrap();
        let mut backend = EvdevBackend::with_input_dir(dir.path());

        assert!(backend.init_subsystem().is_ok());
        assert!(backend.is_initialized());
        assert_eq!(backend.device_count(), 0);
        assert!(backend.open(0).is_none());
        assert_eq!(backend.device_name(0), None);

        backend.quit_subsystem();
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_event_delivery_is_recorded() {
        let mut backend = EvdevBackend::new();
        assert!(backend.event_delivery());
        backend.set_event_delivery(false);
        assert!(!backend.event_delivery());
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_scan_with_real_hardware() {
        // This test requires a connected joystick
        let mut backend = EvdevBackend::new();
        assert!(backend.init_subsystem().is_ok());
        assert!(backend.device_count() > 0, "Should detect a connected joystick");

        let path = backend.device_paths().next().unwrap().to_path_buf();
        assert!(path.to_string_lossy().starts_with("/dev/input/event"));
        assert!(backend.device_name(0).is_some());
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_refresh_with_real_hardware() {
        // This test requires a connected joystick
        let mut backend = EvdevBackend::new();
        backend.init_subsystem().expect("Joystick subsystem unavailable");
        let mut joystick = backend.open(0).expect("Joystick not found");

        joystick.refresh();
        println!("{:?}", joystick);
        for axis in 0..joystick.axis_count() {
            let value = joystick.axis(axis);
            assert!((-MAX_AXIS_AMOUNT..=MAX_AXIS_AMOUNT).contains(&value));
        }
    }
}
