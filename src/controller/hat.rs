//! # Hat Module
//!
//! Raw hat (directional pad) values and their four-direction decomposition.
//!
//! Raw hat values are bitmasks in the layout most joystick drivers report:
//!
//! | Direction | Bit |
//! |-----------|-----|
//! | Up        | 0x01 |
//! | Right     | 0x02 |
//! | Down      | 0x04 |
//! | Left      | 0x08 |
//!
//! Diagonals are the OR of two adjacent directions; 0 is centered.

use serde::Serialize;

/// Hat is centered (no direction pressed).
pub const HAT_CENTERED: u8 = 0x00;
/// Hat up bit.
pub const HAT_UP: u8 = 0x01;
/// Hat right bit.
pub const HAT_RIGHT: u8 = 0x02;
/// Hat down bit.
pub const HAT_DOWN: u8 = 0x04;
/// Hat left bit.
pub const HAT_LEFT: u8 = 0x08;

/// Four-direction decomposition of a raw hat value.
///
/// Up and down are mutually exclusive, as are left and right; when a driver
/// reports both bits of a pair, up wins over down and right wins over left.
///
/// # Examples
///
/// ```
/// use joystick_arbiter::controller::hat::{HatDirections, HAT_RIGHT, HAT_UP};
///
/// let dirs = HatDirections::from_raw(HAT_UP | HAT_RIGHT);
/// assert!(dirs.up && dirs.right);
/// assert!(!dirs.down && !dirs.left);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HatDirections {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl HatDirections {
    /// Decomposes a raw hat bitmask.
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        let up = raw & HAT_UP != 0;
        let right = raw & HAT_RIGHT != 0;
        Self {
            up,
            down: !up && raw & HAT_DOWN != 0,
            right,
            left: !right && raw & HAT_LEFT != 0,
        }
    }

    /// Whether no direction is pressed.
    #[must_use]
    pub fn is_centered(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }

    /// Recomposes the raw bitmask.
    #[must_use]
    pub fn to_raw(self) -> u8 {
        let mut raw = HAT_CENTERED;
        if self.up {
            raw |= HAT_UP;
        }
        if self.down {
            raw |= HAT_DOWN;
        }
        if self.left {
            raw |= HAT_LEFT;
        }
        if self.right {
            raw |= HAT_RIGHT;
        }
        raw
    }
}

/// Builds a raw hat bitmask from the two signed axes evdev reports per hat.
///
/// `x`: -1 = left, 1 = right. `y`: -1 = up, 1 = down. Zero leaves the pair unset.
#[must_use]
pub fn hat_from_axes(x: i32, y: i32) -> u8 {
    let mut raw = HAT_CENTERED;
    if y < 0 {
        raw |= HAT_UP;
    } else if y > 0 {
        raw |= HAT_DOWN;
    }
    if x > 0 {
        raw |= HAT_RIGHT;
    } else if x < 0 {
        raw |= HAT_LEFT;
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered() {
        let dirs = HatDirections::from_raw(HAT_CENTERED);
        assert!(dirs.is_centered());
        assert_eq!(dirs, HatDirections::default());
    }

    #[test]
    fn test_up_right_diagonal() {
        let dirs = HatDirections::from_raw(HAT_UP | HAT_RIGHT);
        assert!(dirs.up);
        assert!(dirs.right);
        assert!(!dirs.down);
        assert!(!dirs.left);
    }

    #[test]
    fn test_down_left_diagonal() {
        let dirs = HatDirections::from_raw(HAT_DOWN | HAT_LEFT);
        assert_eq!(
            dirs,
            HatDirections {
                up: false,
                down: true,
                left: true,
                right: false,
            }
        );
    }

    #[test]
    fn test_opposite_bits_are_exclusive() {
        let dirs = HatDirections::from_raw(HAT_UP | HAT_DOWN | HAT_LEFT | HAT_RIGHT);
        assert!(dirs.up && !dirs.down);
        assert!(dirs.right && !dirs.left);
    }

    #[test]
    fn test_to_raw_matches_single_directions() {
        for raw in [HAT_UP, HAT_DOWN, HAT_LEFT, HAT_RIGHT, HAT_UP | HAT_LEFT] {
            assert_eq!(HatDirections::from_raw(raw).to_raw(), raw);
        }
    }

    #[test]
    fn test_hat_from_axes() {
        assert_eq!(hat_from_axes(0, 0), HAT_CENTERED);
        assert_eq!(hat_from_axes(0, -1), HAT_UP);
        assert_eq!(hat_from_axes(0, 1), HAT_DOWN);
        assert_eq!(hat_from_axes(1, 0), HAT_RIGHT);
        assert_eq!(hat_from_axes(-1, 0), HAT_LEFT);
        assert_eq!(hat_from_axes(1, -1), HAT_UP | HAT_RIGHT);
    }
}
