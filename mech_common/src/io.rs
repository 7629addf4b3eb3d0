//! Opaque actuator/sensor capability traits.
//!
//! The control core treats hardware ports as side-effecting but non-blocking
//! and always-succeeding. Real drivers and the simulation backend both
//! implement these traits; the control loop never sees the difference.
//!
//! A stuck or disconnected digital sensor is indistinguishable from `false`
//! at this layer. Collaborators needing fault detection must add redundant
//! sensing above this core.

/// Open-loop motor output port.
///
/// # Timing
/// `set_output` must behave like a register write: non-blocking and safe to
/// call from the cycle thread every period. Implementations clamp to the
/// normalized range.
pub trait MotorOutput: Send + Sync {
    /// Command normalized power in [-1.0, 1.0]. Fire-and-forget.
    fn set_output(&self, power: f64);
}

/// Digital (boolean) sensor input port.
pub trait DigitalInput: Send + Sync {
    /// Read the current raw level. Non-blocking.
    fn read(&self) -> bool;
}

/// Clamp a commanded power to the normalized [-1.0, 1.0] range.
///
/// NaN maps to 0.0 (safe output).
#[inline]
pub fn clamp_power(power: f64) -> f64 {
    if power.is_nan() { 0.0 } else { power.clamp(-1.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_power_bounds() {
        assert_eq!(clamp_power(0.5), 0.5);
        assert_eq!(clamp_power(1.5), 1.0);
        assert_eq!(clamp_power(-2.0), -1.0);
        assert_eq!(clamp_power(f64::NAN), 0.0);
    }
}
