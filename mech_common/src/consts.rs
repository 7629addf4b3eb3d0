//! Workspace-wide constants and parameter bounds.
//!
//! Config fields default to these values; `validate()` enforces the bounds.

/// Default control cycle period [ms] (200 Hz loop).
pub const CYCLE_PERIOD_MS_DEFAULT: u64 = 5;
/// Minimum allowed cycle period [ms].
pub const CYCLE_PERIOD_MS_MIN: u64 = 1;
/// Maximum allowed cycle period [ms].
pub const CYCLE_PERIOD_MS_MAX: u64 = 100;

/// Maximum number of subsystems one cycle runner can carry
/// (compile-time bound for the fixed registration list).
pub const MAX_SUBSYSTEMS: usize = 8;

// ─── Feeder tuning defaults ─────────────────────────────────────────

/// Reverse power applied while unjamming the feeder.
pub const FEEDER_UNJAM_POWER_DEFAULT: f64 = -1.0;
/// Feeder unjam self-timeout [ms].
pub const FEEDER_UNJAM_PERIOD_MS_DEFAULT: u64 = 500;
/// Incremental feed clog timeout [ms] — no ball at the exit sensor
/// within this window means a jam.
pub const FEEDER_CLOG_PERIOD_MS_DEFAULT: u64 = 1000;
/// Power for feeding one ball at a time.
pub const FEEDER_INCREMENT_POWER_DEFAULT: f64 = 0.65;
/// Power for feeding continuously into the shooter.
pub const FEEDER_CONTINUOUS_POWER_DEFAULT: f64 = 1.0;

// ─── Intake tuning defaults ─────────────────────────────────────────

/// Roller power while accumulating balls.
pub const INTAKE_POWER_DEFAULT: f64 = 1.0;
/// Reverse power applied while unjamming the intake.
pub const INTAKE_UNJAM_POWER_DEFAULT: f64 = -1.0;
/// Intake unjam self-timeout [ms].
pub const INTAKE_UNJAM_PERIOD_MS_DEFAULT: u64 = 500;
/// Minimum continuous assertion of the across-hopper IR before the
/// hopper is reported full [ms].
pub const HOPPER_SENSE_PERIOD_MS_DEFAULT: u64 = 250;
