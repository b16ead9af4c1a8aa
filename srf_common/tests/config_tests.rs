//! File-based configuration loading tests.

use srf_common::config::{ConfigError, TuningConfig};
use std::io::Write;

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[timing]\namp_ramp_settle_secs = 0.5\ninterlock_wait_base_secs = 4.0"
    )
    .unwrap();

    let config = TuningConfig::load(file.path()).unwrap();
    assert_eq!(config.timing.amp_ramp_settle_secs, 0.5);
    assert_eq!(config.timing.interlock_wait_base_secs, 4.0);
    assert_eq!(config.timing.rf_poll_secs, 1.0);
}

#[test]
fn missing_file_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does_not_exist.toml");
    assert!(matches!(
        TuningConfig::load(&path),
        Err(ConfigError::FileNotFound)
    ));
}

#[test]
fn invalid_file_reports_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[[").unwrap();
    assert!(matches!(
        TuningConfig::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}
