//! Configuration structures for the control core.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every field
//! carries a `#[serde(default = "...")]` so a partial file (or no file at
//! all) yields a runnable configuration. Numeric parameters are checked
//! against the bounds in [`crate::consts`] by `validate()`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    CYCLE_PERIOD_MS_DEFAULT, CYCLE_PERIOD_MS_MAX, CYCLE_PERIOD_MS_MIN,
    FEEDER_CLOG_PERIOD_MS_DEFAULT, FEEDER_CONTINUOUS_POWER_DEFAULT,
    FEEDER_INCREMENT_POWER_DEFAULT, FEEDER_UNJAM_PERIOD_MS_DEFAULT, FEEDER_UNJAM_POWER_DEFAULT,
    HOPPER_SENSE_PERIOD_MS_DEFAULT, INTAKE_POWER_DEFAULT, INTAKE_UNJAM_PERIOD_MS_DEFAULT,
    INTAKE_UNJAM_POWER_DEFAULT,
};

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter validation error.
    #[error("config validation: {0}")]
    Validation(String),
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level control configuration, loaded from TOML at startup.
/// Immutable once the cycle runner starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Cycle runner settings.
    #[serde(default)]
    pub cycle: CycleConfig,
    /// Feeder subsystem tuning.
    #[serde(default)]
    pub feeder: FeederTuning,
    /// Intake subsystem tuning.
    #[serde(default)]
    pub intake: IntakeTuning,
}

impl ControlConfig {
    /// Validate all parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        self.cycle.validate()?;
        self.feeder.validate()?;
        self.intake.validate()?;
        Ok(())
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Cycle runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Fixed cycle period [ms].
    #[serde(default = "default_cycle_period_ms")]
    pub period_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_ms: CYCLE_PERIOD_MS_DEFAULT,
        }
    }
}

impl CycleConfig {
    /// Cycle period as a `Duration`.
    #[inline]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.period_ms < CYCLE_PERIOD_MS_MIN || self.period_ms > CYCLE_PERIOD_MS_MAX {
            return Err(format!(
                "cycle period_ms {} out of range [{}, {}]",
                self.period_ms, CYCLE_PERIOD_MS_MIN, CYCLE_PERIOD_MS_MAX
            ));
        }
        Ok(())
    }
}

// ─── Feeder Tuning ──────────────────────────────────────────────────

/// Feeder subsystem tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeederTuning {
    /// Reverse power applied while unjamming.
    #[serde(default = "default_feeder_unjam_power")]
    pub unjam_power: f64,
    /// Unjam self-timeout [ms].
    #[serde(default = "default_feeder_unjam_period_ms")]
    pub unjam_period_ms: u64,
    /// Incremental-feed clog timeout [ms].
    #[serde(default = "default_feeder_clog_period_ms")]
    pub clog_period_ms: u64,
    /// Power for feeding one ball at a time.
    #[serde(default = "default_feeder_increment_power")]
    pub increment_feed_power: f64,
    /// Power for feeding continuously.
    #[serde(default = "default_feeder_continuous_power")]
    pub continuous_feed_power: f64,
}

impl Default for FeederTuning {
    fn default() -> Self {
        Self {
            unjam_power: FEEDER_UNJAM_POWER_DEFAULT,
            unjam_period_ms: FEEDER_UNJAM_PERIOD_MS_DEFAULT,
            clog_period_ms: FEEDER_CLOG_PERIOD_MS_DEFAULT,
            increment_feed_power: FEEDER_INCREMENT_POWER_DEFAULT,
            continuous_feed_power: FEEDER_CONTINUOUS_POWER_DEFAULT,
        }
    }
}

impl FeederTuning {
    /// Unjam timeout as a `Duration`.
    #[inline]
    pub fn unjam_period(&self) -> Duration {
        Duration::from_millis(self.unjam_period_ms)
    }

    /// Clog timeout as a `Duration`.
    #[inline]
    pub fn clog_period(&self) -> Duration {
        Duration::from_millis(self.clog_period_ms)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        check_power("feeder.unjam_power", self.unjam_power)?;
        check_power("feeder.increment_feed_power", self.increment_feed_power)?;
        check_power("feeder.continuous_feed_power", self.continuous_feed_power)?;
        check_period("feeder.unjam_period_ms", self.unjam_period_ms)?;
        check_period("feeder.clog_period_ms", self.clog_period_ms)?;
        Ok(())
    }
}

// ─── Intake Tuning ──────────────────────────────────────────────────

/// Intake subsystem tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeTuning {
    /// Roller power while accumulating.
    #[serde(default = "default_intake_power")]
    pub intake_power: f64,
    /// Reverse power applied while unjamming.
    #[serde(default = "default_intake_unjam_power")]
    pub unjam_power: f64,
    /// Unjam self-timeout [ms].
    #[serde(default = "default_intake_unjam_period_ms")]
    pub unjam_period_ms: u64,
    /// Hopper-full debounce duration [ms].
    #[serde(default = "default_hopper_sense_period_ms")]
    pub hopper_sense_period_ms: u64,
}

impl Default for IntakeTuning {
    fn default() -> Self {
        Self {
            intake_power: INTAKE_POWER_DEFAULT,
            unjam_power: INTAKE_UNJAM_POWER_DEFAULT,
            unjam_period_ms: INTAKE_UNJAM_PERIOD_MS_DEFAULT,
            hopper_sense_period_ms: HOPPER_SENSE_PERIOD_MS_DEFAULT,
        }
    }
}

impl IntakeTuning {
    /// Unjam timeout as a `Duration`.
    #[inline]
    pub fn unjam_period(&self) -> Duration {
        Duration::from_millis(self.unjam_period_ms)
    }

    /// Hopper-full debounce duration as a `Duration`.
    #[inline]
    pub fn hopper_sense_period(&self) -> Duration {
        Duration::from_millis(self.hopper_sense_period_ms)
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        check_power("intake.intake_power", self.intake_power)?;
        check_power("intake.unjam_power", self.unjam_power)?;
        check_period("intake.unjam_period_ms", self.unjam_period_ms)?;
        check_period("intake.hopper_sense_period_ms", self.hopper_sense_period_ms)?;
        Ok(())
    }
}

// ─── Validation Helpers ─────────────────────────────────────────────

fn check_power(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
        return Err(format!("{name} {value} out of range [-1.0, 1.0]"));
    }
    Ok(())
}

fn check_period(name: &str, value_ms: u64) -> Result<(), String> {
    if value_ms == 0 {
        return Err(format!("{name} must be > 0"));
    }
    Ok(())
}

// ─── Serde Default Functions ────────────────────────────────────────

fn default_cycle_period_ms() -> u64 {
    CYCLE_PERIOD_MS_DEFAULT
}
fn default_feeder_unjam_power() -> f64 {
    FEEDER_UNJAM_POWER_DEFAULT
}
fn default_feeder_unjam_period_ms() -> u64 {
    FEEDER_UNJAM_PERIOD_MS_DEFAULT
}
fn default_feeder_clog_period_ms() -> u64 {
    FEEDER_CLOG_PERIOD_MS_DEFAULT
}
fn default_feeder_increment_power() -> f64 {
    FEEDER_INCREMENT_POWER_DEFAULT
}
fn default_feeder_continuous_power() -> f64 {
    FEEDER_CONTINUOUS_POWER_DEFAULT
}
fn default_intake_power() -> f64 {
    INTAKE_POWER_DEFAULT
}
fn default_intake_unjam_power() -> f64 {
    INTAKE_UNJAM_POWER_DEFAULT
}
fn default_intake_unjam_period_ms() -> u64 {
    INTAKE_UNJAM_PERIOD_MS_DEFAULT
}
fn default_hopper_sense_period_ms() -> u64 {
    HOPPER_SENSE_PERIOD_MS_DEFAULT
}

// ─── Loading ────────────────────────────────────────────────────────

/// Load and validate a control configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ControlConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    let config: ControlConfig =
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ControlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle.period(), Duration::from_millis(5));
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: ControlConfig = toml::from_str("").unwrap();
        assert_eq!(config.feeder.unjam_period_ms, FEEDER_UNJAM_PERIOD_MS_DEFAULT);
        assert_eq!(config.intake.intake_power, INTAKE_POWER_DEFAULT);
    }

    #[test]
    fn partial_toml_overrides_one_field() {
        let config: ControlConfig = toml::from_str(
            r#"
            [feeder]
            unjam_period_ms = 750
            "#,
        )
        .unwrap();
        assert_eq!(config.feeder.unjam_period_ms, 750);
        // Untouched fields keep their defaults.
        assert_eq!(config.feeder.continuous_feed_power, FEEDER_CONTINUOUS_POWER_DEFAULT);
    }

    #[test]
    fn power_out_of_range_rejected() {
        let mut config = ControlConfig::default();
        config.intake.intake_power = 1.5;
        assert!(config.validate().is_err());
        config.intake.intake_power = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_period_rejected() {
        let mut config = ControlConfig::default();
        config.feeder.clog_period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cycle_period_bounds() {
        let mut config = ControlConfig::default();
        config.cycle.period_ms = 0;
        assert!(config.validate().is_err());
        config.cycle.period_ms = 1000;
        assert!(config.validate().is_err());
        config.cycle.period_ms = 10;
        assert!(config.validate().is_ok());
    }
}
