//! In-process simulation ports.
//!
//! Stand-ins for real motor controllers and digital sensors, used by the
//! binary when no hardware is present and by the test suites. Handles are
//! shared (`Arc`), so a test can drive a sensor level and observe the
//! motor command while the cycle thread runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use mech_common::io::{clamp_power, DigitalInput, MotorOutput};

/// Simulated open-loop motor. Stores the last commanded power.
#[derive(Debug, Default)]
pub struct SimMotor {
    output: Mutex<f64>,
}

impl SimMotor {
    /// Create a shared simulated motor with zero output.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Last commanded power (clamped).
    pub fn output(&self) -> f64 {
        *self.output.lock()
    }
}

impl MotorOutput for SimMotor {
    fn set_output(&self, power: f64) {
        *self.output.lock() = clamp_power(power);
    }
}

/// Simulated digital sensor with an externally driven level.
#[derive(Debug)]
pub struct SimDigitalInput {
    level: AtomicBool,
}

impl SimDigitalInput {
    /// Create a shared simulated input at the given initial level.
    pub fn new(initial: bool) -> Arc<Self> {
        Arc::new(Self {
            level: AtomicBool::new(initial),
        })
    }

    /// Drive the raw level (e.g. from a test).
    pub fn set(&self, level: bool) {
        self.level.store(level, Ordering::Relaxed);
    }
}

impl DigitalInput for SimDigitalInput {
    fn read(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motor_clamps_commands() {
        let motor = SimMotor::new();
        motor.set_output(0.4);
        assert_eq!(motor.output(), 0.4);
        motor.set_output(3.0);
        assert_eq!(motor.output(), 1.0);
    }

    #[test]
    fn input_reflects_driven_level() {
        let input = SimDigitalInput::new(false);
        assert!(!input.read());
        input.set(true);
        assert!(input.read());
    }
}
