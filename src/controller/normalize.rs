//! # Axis Normalization Module
//!
//! Converts raw signed axis samples into normalized magnitudes and applies the
//! process-wide deadzone.
//!
//! ## Deadzone
//!
//! A deadzone eliminates small stick movements near center to prevent drift.
//! Samples whose magnitude is at or below the deadzone threshold map to exactly
//! 0.0, while samples outside are rescaled so the threshold maps to 0.0 and the
//! full raw range maps to ±1.0. The mapping is continuous at the threshold and
//! symmetric around zero.
//!
//! ## Usage
//!
//! ```
//! use joystick_arbiter::controller::normalize::{Deadzone, MAX_AXIS_AMOUNT};
//!
//! let deadzone = Deadzone::new(0.1); // 10% of the raw range
//!
//! // Sample near center (within deadzone)
//! assert_eq!(deadzone.normalize(3000), 0.0);
//!
//! // Sample at full deflection
//! assert_eq!(deadzone.normalize(MAX_AXIS_AMOUNT), 1.0);
//! ```

/// Largest raw axis magnitude reported by 16-bit signed hardware.
pub const MAX_AXIS_AMOUNT: i32 = 32767;

/// Smallest raw axis sample reported by 16-bit signed hardware.
pub const MIN_AXIS_AMOUNT: i32 = -32768;

/// Maps a raw signed sample to -1.0..=1.0 given a raw deadzone threshold.
///
/// # Arguments
///
/// * `raw` - Raw axis sample
/// * `threshold` - Raw magnitude at or below which the sample is treated as noise
/// * `max_range` - Raw magnitude that maps to ±1.0
///
/// # Examples
///
/// ```
/// use joystick_arbiter::controller::normalize::normalize_axis;
///
/// assert_eq!(normalize_axis(100, 3276, 32767), 0.0);
/// assert_eq!(normalize_axis(32767, 3276, 32767), 1.0);
/// assert_eq!(normalize_axis(-32767, 3276, 32767), -1.0);
/// ```
#[must_use]
pub fn normalize_axis(raw: i32, threshold: i32, max_range: i32) -> f32 {
    let span = max_range - threshold;
    if span <= 0 {
        return 0.0;
    }

    let shifted = if raw > threshold {
        raw - threshold
    } else if raw < -threshold {
        raw + threshold
    } else {
        return 0.0;
    };

    (shifted as f32 / span as f32).clamp(-1.0, 1.0)
}

/// Process-wide deadzone, held as a fraction of the raw axis range.
///
/// The fraction is clamped to 0.0..=1.0 and converted once into the raw
/// integer threshold used by every normalization and arbitration pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzone {
    /// Deadzone as a fraction of the raw range (0.0 to 1.0).
    fraction: f32,
    /// Raw magnitude threshold derived from `fraction`.
    threshold: i32,
}

impl Default for Deadzone {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Deadzone {
    /// Creates a deadzone from a fraction of the raw range.
    ///
    /// Values outside 0.0..=1.0 are clamped; NaN is treated as 0.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use joystick_arbiter::controller::normalize::Deadzone;
    ///
    /// let deadzone = Deadzone::new(1.5);
    /// assert_eq!(deadzone.fraction(), 1.0);
    /// ```
    #[must_use]
    pub fn new(fraction: f32) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };

        Self {
            fraction,
            threshold: (fraction * MAX_AXIS_AMOUNT as f32) as i32,
        }
    }

    /// Returns the clamped fraction actually applied.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    /// Returns the raw magnitude threshold.
    #[must_use]
    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// Whether a raw sample lies outside the deadzone.
    #[inline]
    #[must_use]
    pub fn exceeds(&self, raw: i32) -> bool {
        raw.saturating_abs() > self.threshold
    }

    /// Normalizes a raw sample against this deadzone and the full raw range.
    #[must_use]
    pub fn normalize(&self, raw: i32) -> f32 {
        normalize_axis(raw, self.threshold, MAX_AXIS_AMOUNT)
    }
}
