//! Tuning/timing configuration.
//!
//! Every fixed settle delay and poll interval of the blocking control
//! model lives here so deployments can retune them without a rebuild.
//! Loaded from TOML; every field has a default matching the commissioning
//! procedures, so an empty file (or no file) is a valid configuration.
//!
//! # TOML Example
//!
//! ```toml
//! [timing]
//! rf_poll_secs = 1.0
//! amp_ramp_settle_secs = 0.1
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the given path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Poll intervals and settle delays for the blocking control loops [s].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Poll interval while waiting for RF or SSA state changes.
    pub rf_poll_secs: f64,
    /// Settle after starting an SSA calibration or characterization run.
    pub run_start_settle_secs: f64,
    /// Poll interval while a calibration/characterization run is active.
    pub run_poll_secs: f64,
    /// Settle after a move command before the motor reports motion.
    pub stepper_settle_secs: f64,
    /// Poll interval while the stepper motor is moving.
    pub stepper_poll_secs: f64,
    /// Settle after each piezo enable/mode write.
    pub piezo_settle_secs: f64,
    /// First interlock-reset wait; grows by the increment on each retry.
    pub interlock_wait_base_secs: f64,
    pub interlock_wait_increment_secs: f64,
    /// Settle after reprogramming the chirp window.
    pub chirp_settle_secs: f64,
    /// Wait for the detune measurement to catch up after RF-on in chirp.
    pub detune_catchup_secs: f64,
    /// Pause between amplitude ramp steps. Kept short to respect the
    /// rate-sensitive interlock on the amplitude channel.
    pub amp_ramp_settle_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            rf_poll_secs: 1.0,
            run_start_settle_secs: 2.0,
            run_poll_secs: 1.0,
            stepper_settle_secs: 5.0,
            stepper_poll_secs: 5.0,
            piezo_settle_secs: 2.0,
            interlock_wait_base_secs: 3.0,
            interlock_wait_increment_secs: 2.0,
            chirp_settle_secs: 1.0,
            detune_catchup_secs: 5.0,
            amp_ramp_settle_secs: 0.1,
        }
    }
}

/// Top-level tuning configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub timing: TimingConfig,
}

impl TuningConfig {
    /// Parse from a TOML string. Missing fields take their defaults.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(input).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound);
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// All delays must be non-negative and finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        let fields = [
            ("rf_poll_secs", t.rf_poll_secs),
            ("run_start_settle_secs", t.run_start_settle_secs),
            ("run_poll_secs", t.run_poll_secs),
            ("stepper_settle_secs", t.stepper_settle_secs),
            ("stepper_poll_secs", t.stepper_poll_secs),
            ("piezo_settle_secs", t.piezo_settle_secs),
            ("interlock_wait_base_secs", t.interlock_wait_base_secs),
            (
                "interlock_wait_increment_secs",
                t.interlock_wait_increment_secs,
            ),
            ("chirp_settle_secs", t.chirp_settle_secs),
            ("detune_catchup_secs", t.detune_catchup_secs),
            ("amp_ramp_settle_secs", t.amp_ramp_settle_secs),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TuningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing.amp_ramp_settle_secs, 0.1);
        assert_eq!(config.timing.interlock_wait_base_secs, 3.0);
        assert_eq!(config.timing.interlock_wait_increment_secs, 2.0);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = TuningConfig::from_toml("").unwrap();
        assert_eq!(config, TuningConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = TuningConfig::from_toml(
            r#"
[timing]
amp_ramp_settle_secs = 0.25
stepper_poll_secs = 2.0
"#,
        )
        .unwrap();
        assert_eq!(config.timing.amp_ramp_settle_secs, 0.25);
        assert_eq!(config.timing.stepper_poll_secs, 2.0);
        // Untouched fields keep their defaults.
        assert_eq!(config.timing.rf_poll_secs, 1.0);
    }

    #[test]
    fn negative_delay_rejected() {
        let result = TuningConfig::from_toml("[timing]\nrf_poll_secs = -1.0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn bad_toml_rejected() {
        let result = TuningConfig::from_toml("not toml ===");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
