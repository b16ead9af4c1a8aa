//! Error taxonomy shared by all cavity controllers.
//!
//! Low-level actuators return the most specific kind they can; the cavity
//! orchestrator only absorbs the kinds with a documented bounded retry
//! (SSA calibration, interlock reset, chirp widening). Everything else
//! propagates to the caller unchanged.

use thiserror::Error;

/// Fault from the control-point access layer itself (transport, typing).
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// The remote variable could not be reached.
    #[error("control point unreachable: {0}")]
    Unreachable(String),

    /// The value read back could not be interpreted as the expected type.
    #[error("unexpected value type at {0}")]
    BadValue(String),

    /// A write was refused by the remote end.
    #[error("write rejected at {0}")]
    WriteRejected(String),
}

/// Errors raised while tuning and commissioning a cavity.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Cooperative cancellation: the abort flag was observed inside a
    /// polling loop. Always recoverable by the caller.
    #[error("operation aborted: {0}")]
    Aborted(String),

    /// SSA stayed faulted through the bounded reset attempts.
    #[error("SSA fault: {0}")]
    SsaFault(String),

    /// An SSA calibration run failed or crashed.
    #[error("SSA calibration failed: {0}")]
    SsaCalibration(String),

    /// An SSA calibration produced a result outside its acceptance band.
    #[error("SSA calibration out of tolerance: {0}")]
    SsaCalibrationTolerance(String),

    /// Resonance search or auto-tune could not converge, or the detune
    /// readback lost validity.
    #[error("detune error: {0}")]
    Detune(String),

    /// Interlock or hardware fault that resisted the bounded resets.
    #[error("cavity fault: {0}")]
    CavityFault(String),

    /// Superconducting quench latched. Never retried; any in-flight
    /// amplitude change stops immediately.
    #[error("quench detected: {0}")]
    Quench(String),

    /// The stepper motor stopped on a limit switch.
    #[error("stepper fault: {0}")]
    Stepper(String),

    /// A cavity characterization run failed, crashed or went stale.
    #[error("characterization failed: {0}")]
    Characterization(String),

    /// Measured loaded Q outside its acceptance band.
    #[error("loaded Q out of tolerance: {0}")]
    QLoaded(String),

    /// Measured probe scale factor outside its acceptance band.
    #[error("scale factor out of tolerance: {0}")]
    ScaleFactor(String),

    /// Operation refused because the cavity hardware mode forbids it.
    #[error("hardware mode error: {0}")]
    HwMode(String),

    /// Transport-level failure from the control-point access layer.
    #[error("control point error: {0}")]
    ControlPoint(#[from] ControlError),
}

impl Error {
    /// True for the cooperative-cancellation kind, which callers must
    /// never absorb into a retry loop.
    #[inline]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// True for the kinds an SSA calibration is allowed to retry on.
    #[inline]
    pub const fn is_calibration_retryable(&self) -> bool {
        matches!(self, Self::SsaCalibration(_) | Self::SsaCalibrationTolerance(_))
    }
}

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
