//! Config file loading tests: TOML parsing, validation, error mapping.

use std::fs;

use mech_common::config::{load_config, ConfigError};
use tempfile::TempDir;

#[test]
fn load_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("control.toml");
    fs::write(
        &path,
        r#"
[cycle]
period_ms = 10

[feeder]
unjam_power = -0.8
unjam_period_ms = 400
clog_period_ms = 900
increment_feed_power = 0.5
continuous_feed_power = 0.9

[intake]
intake_power = 0.75
unjam_power = -0.75
unjam_period_ms = 600
hopper_sense_period_ms = 300
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.cycle.period_ms, 10);
    assert_eq!(config.feeder.unjam_period_ms, 400);
    assert_eq!(config.intake.hopper_sense_period_ms, 300);
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn malformed_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("control.toml");
    fs::write(&path, "[cycle\nperiod_ms = 5").unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn out_of_range_power_is_validation_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("control.toml");
    fs::write(
        &path,
        r#"
[feeder]
continuous_feed_power = 2.0
"#,
    )
    .unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
    assert!(err.to_string().contains("continuous_feed_power"));
}
