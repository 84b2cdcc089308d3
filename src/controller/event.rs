//! # Joystick Events
//!
//! Discrete hardware notifications consumed by the event-driven ingest path.
//! Indices are 0-based; the arbiter reports 1-based ids.

/// One discrete joystick notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickEvent {
    /// A button went down.
    ButtonDown { device: usize, button: usize },
    /// A button went up.
    ButtonUp { device: usize, button: usize },
    /// An analog axis moved to `value` (16-bit signed range).
    AxisMotion { device: usize, axis: usize, value: i32 },
    /// A hat moved to the raw bitmask `value`.
    HatMotion { device: usize, hat: usize, value: u8 },
    /// A trackball moved. Ignored by arbitration.
    BallMotion { device: usize, ball: usize, dx: i32, dy: i32 },
    /// Any other notification. Ignored.
    Other,
}

impl JoystickEvent {
    /// Device index the event originated from, if any.
    #[must_use]
    pub fn device(&self) -> Option<usize> {
        match *self {
            Self::ButtonDown { device, .. }
            | Self::ButtonUp { device, .. }
            | Self::AxisMotion { device, .. }
            | Self::HatMotion { device, .. }
            | Self::BallMotion { device, .. } => Some(device),
            Self::Other => None,
        }
    }

    /// Whether arbitration and snapshot delivery act on this event.
    #[must_use]
    pub fn is_relevant(&self) -> bool {
        matches!(
            self,
            Self::ButtonDown { .. }
                | Self::ButtonUp { .. }
                | Self::AxisMotion { .. }
                | Self::HatMotion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_index() {
        assert_eq!(JoystickEvent::ButtonDown { device: 2, button: 0 }.device(), Some(2));
        assert_eq!(
            JoystickEvent::BallMotion { device: 1, ball: 0, dx: 3, dy: -3 }.device(),
            Some(1)
        );
        assert_eq!(JoystickEvent::Other.device(), None);
    }

    #[test]
    fn test_ball_and_other_are_not_relevant() {
        assert!(!JoystickEvent::BallMotion { device: 0, ball: 0, dx: 1, dy: 1 }.is_relevant());
        assert!(!JoystickEvent::Other.is_relevant());
        assert!(JoystickEvent::HatMotion { device: 0, hat: 0, value: 1 }.is_relevant());
        assert!(JoystickEvent::AxisMotion { device: 0, axis: 0, value: 0 }.is_relevant());
    }
}
