//! # Repeat Timer Module
//!
//! Keyboard-style auto-repeat applied to held button and hat activations.
//!
//! The first query after a new press always reports the activation. Further
//! queries are suppressed until the initial delay has elapsed since the press
//! began, after which one query per repeat interval reports it again. The
//! timer only filters what a query reports; it never alters the activation.

use serde::Deserialize;

/// Default delay before a held activation starts repeating.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Default interval between successive repeats.
pub const DEFAULT_REPEAT_INTERVAL_MS: u64 = 100;

/// Identity and start time of one press.
///
/// `serial` distinguishes presses that begin on the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressStamp {
    /// Tick at which the activation began.
    pub started_at: u64,
    /// Monotonically increasing press counter.
    pub serial: u64,
}

/// Repeat timing shared by the button and hat classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RepeatPolicy {
    /// Delay before the first repeat, measured from the press.
    pub initial_delay_ms: u64,
    /// Minimum spacing between repeats.
    pub interval_ms: u64,
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            interval_ms: DEFAULT_REPEAT_INTERVAL_MS,
        }
    }
}

/// Per-class repeat state.
///
/// # Examples
///
/// ```
/// use joystick_arbiter::controller::repeat::{PressStamp, RepeatPolicy, RepeatTimer};
///
/// let policy = RepeatPolicy::default();
/// let press = PressStamp { started_at: 0, serial: 1 };
/// let mut timer = RepeatTimer::new();
///
/// assert!(timer.should_report(&press, 0, &policy));    // edge
/// assert!(!timer.should_report(&press, 200, &policy)); // initial delay
/// assert!(timer.should_report(&press, 600, &policy));  // first repeat
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepeatTimer {
    last_press: Option<u64>,
    last_repeat: Option<u64>,
}

impl RepeatTimer {
    /// Creates a timer that has seen no press yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a query at `now` reports the activation started by `press`.
    pub fn should_report(&mut self, press: &PressStamp, now: u64, policy: &RepeatPolicy) -> bool {
        if self.last_press != Some(press.serial) {
            self.last_press = Some(press.serial);
            self.last_repeat = None;
            return true;
        }

        if now.saturating_sub(press.started_at) < policy.initial_delay_ms {
            return false;
        }

        if let Some(last) = self.last_repeat {
            if now.saturating_sub(last) < policy.interval_ms {
                return false;
            }
        }

        self.last_repeat = Some(now);
        true
    }

    /// Forgets the last press, so the next query is treated as a new edge.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
