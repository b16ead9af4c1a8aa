//! Firmware codes, calibration limits and motion defaults.
//!
//! Numeric values mirror what the LLRF and SSA chassis firmware report on
//! their status and result control points. Calibration tolerance bands are
//! the accepted commissioning limits for 1.3 GHz cavities, with separate
//! bands for the 3.9 GHz harmonic-linearizer (HL) cavities.

// ─── SSA calibration ────────────────────────────────────────────────

/// Acceptable SSA gain-slope band (exclusive bounds).
pub const SSA_SLOPE_LOWER_LIMIT: f64 = 0.3;
pub const SSA_SLOPE_UPPER_LIMIT: f64 = 2.0;

/// Minimum calibrated forward power [W].
pub const SSA_FWD_PWR_LOWER_LIMIT: f64 = 3000.0;
/// HL SSAs run at lower power per cavity.
pub const SSA_FWD_PWR_LOWER_LIMIT_HL: f64 = 500.0;

/// Lowest drive max a calibration may be requested at.
pub const SSA_DRIVE_MAX_LOWER_LIMIT: f64 = 0.4;

/// Default saved drive max when none has been stored yet.
pub const SSA_DEFAULT_DRIVE_MAX: f64 = 0.8;
pub const SSA_DEFAULT_DRIVE_MAX_HL: f64 = 1.0;

/// Calibration retries on a failed or out-of-tolerance run.
pub const SSA_CALIBRATION_RETRIES: u32 = 3;

/// Value the calibration result-status point reports for a good run.
pub const SSA_RESULT_GOOD_STATUS: i64 = 0;

/// Power-supply voltage setpoint written to HL SSAs after power-on.
pub const HL_SSA_PS_SETPOINT: f64 = 2500.0;

/// SSA control points shared between the two cavities fed by one HL SSA.
pub const HL_SSA_SHARED_SUFFIXES: [&str; 8] = [
    "PSVoltSetpt1",
    "PSVoltSetpt2",
    "StatusMsg",
    "PowerOn",
    "PowerOff",
    "FaultReset",
    "NRP_PRMT",
    "FaultSummary.SEVR",
];

// ─── Interlocks & faults ────────────────────────────────────────────

/// Bounded attempts for interlock clears and SSA fault resets.
pub const INTERLOCK_RESET_ATTEMPTS: u32 = 5;

// ─── Cavity characterization ────────────────────────────────────────

/// Loaded-Q acceptance band.
pub const LOADED_Q_LOWER_LIMIT: f64 = 2.5e7;
pub const LOADED_Q_UPPER_LIMIT: f64 = 5.1e7;
pub const LOADED_Q_LOWER_LIMIT_HL: f64 = 1.5e7;
pub const LOADED_Q_UPPER_LIMIT_HL: f64 = 3.5e7;

/// Probe scale-factor acceptance band.
pub const CAVITY_SCALE_LOWER_LIMIT: f64 = 10.0;
pub const CAVITY_SCALE_UPPER_LIMIT: f64 = 125.0;
pub const CAVITY_SCALE_LOWER_LIMIT_HL: f64 = 6.0;
pub const CAVITY_SCALE_UPPER_LIMIT_HL: f64 = 25.0;

/// A successful characterization younger than this is reused [s].
pub const CHARACTERIZATION_REUSE_WINDOW_SECS: f64 = 60.0;
/// A characterization result older than this is considered stale [s].
pub const CHARACTERIZATION_STALE_SECS: f64 = 300.0;

/// Waveform acquisition decimation restored after characterization.
pub const DATA_DECIMATION_DEFAULT: f64 = 255.0;

/// Drive level safe for pulsed characterization work [%].
pub const SAFE_PULSED_DRIVE_LEVEL: f64 = 10.0;

// ─── Stepper tuner ──────────────────────────────────────────────────

pub const DEFAULT_STEPPER_MAX_STEPS: i64 = 1_000_000;
pub const DEFAULT_STEPPER_SPEED: u32 = 20_000;
/// Hardware ceiling set by the tuner experts [steps/s].
pub const MAX_STEPPER_SPEED: u32 = 60_000;

/// Limit-switch readback value when the switch is engaged.
pub const STEPPER_ON_LIMIT_SWITCH_VALUE: i64 = 1;

// ─── Piezo tuner ────────────────────────────────────────────────────

/// Bias voltage centering the piezo stack in its range [V].
pub const PIEZO_CENTER_VOLTAGE: f64 = 25.0;
/// Empirical detune sensitivity of the piezo [Hz/V].
pub const PIEZO_HZ_PER_VOLT: f64 = 20.0;

// ─── Resonance tuning ───────────────────────────────────────────────

/// Detune convergence tolerance [Hz].
pub const TUNE_TOLERANCE_HZ: f64 = 50.0;
pub const TUNE_TOLERANCE_HZ_HL: f64 = 500.0;
/// Piezo-centering convergence tolerance [Hz].
pub const PIEZO_CENTERING_TOLERANCE_HZ: f64 = 100.0;

/// Damping applied to each proportional tuner step to avoid overshoot.
pub const TUNE_STEP_DAMPING: f64 = 0.9;

/// Default chirp half-window [Hz] and the widening cap.
pub const DEFAULT_CHIRP_RANGE_HZ: f64 = 50_000.0;
pub const MAX_CHIRP_RANGE_HZ: f64 = 400_000.0;

// ─── Addressing ─────────────────────────────────────────────────────

/// Cryomodule names per linac section. L1B carries the two 3.9 GHz
/// harmonic-linearizer modules H1 and H2.
pub const LINAC_CRYOMODULES: [&[&str]; 4] = [
    &["01"],
    &["02", "03", "H1", "H2"],
    &[
        "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "14", "15",
    ],
    &[
        "16", "17", "18", "19", "20", "21", "22", "23", "24", "25", "26", "27", "28", "29", "30",
        "31", "32", "33", "34", "35",
    ],
];

/// Harmonic-linearizer cryomodule names.
pub const HL_CRYOMODULES: [&str; 2] = ["H1", "H2"];
