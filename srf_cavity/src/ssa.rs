//! Solid-state amplifier (SSA) controller.
//!
//! Powers the RF amplifier on and off, clears faults with a bounded reset
//! sequence, and runs the forward-power/gain-slope calibration. Each
//! logical SSA belongs to one cavity; on the harmonic-linearizer modules
//! one physical amplifier feeds two cavities, so the shared chassis
//! control points of cavities 5-8 alias those of cavities 1-4 while the
//! calibration points stay per-cavity.

use crate::cavity::CavityCore;
use crate::controls::ControlPoint;
use srf_common::consts::{
    HL_SSA_PS_SETPOINT, HL_SSA_SHARED_SUFFIXES, INTERLOCK_RESET_ATTEMPTS,
    SSA_CALIBRATION_RETRIES, SSA_DEFAULT_DRIVE_MAX, SSA_DEFAULT_DRIVE_MAX_HL,
    SSA_DRIVE_MAX_LOWER_LIMIT, SSA_FWD_PWR_LOWER_LIMIT, SSA_FWD_PWR_LOWER_LIMIT_HL,
    SSA_RESULT_GOOD_STATUS, SSA_SLOPE_LOWER_LIMIT, SSA_SLOPE_UPPER_LIMIT,
};
use srf_common::error::{Error, Result};
use srf_common::state::{RunStatus, SsaStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Ssa {
    core: Arc<CavityCore>,
    status: ControlPoint,
    power_on: ControlPoint,
    power_off: ControlPoint,
    fault_reset: ControlPoint,
    ps_volt_setpoint1: ControlPoint,
    ps_volt_setpoint2: ControlPoint,
    cal_start: ControlPoint,
    cal_status: ControlPoint,
    cal_result: ControlPoint,
    max_fwd_power: ControlPoint,
    measured_slope: ControlPoint,
    drive_max_setpoint: ControlPoint,
    saved_drive_max: ControlPoint,
}

impl Ssa {
    pub(crate) fn new(core: Arc<CavityCore>) -> Self {
        let own = format!("{}SSA:", core.id().prefix());
        // HL cavities 5-8 share the amplifier chassis of cavities 1-4.
        let shared = if core.is_hl() && core.id().number > 4 {
            let mut paired = core.id().clone();
            paired.number -= 4;
            format!("{}SSA:", paired.prefix())
        } else {
            own.clone()
        };
        let point = |suffix: &str| {
            let base = if HL_SSA_SHARED_SUFFIXES.contains(&suffix) {
                &shared
            } else {
                &own
            };
            ControlPoint::new(format!("{base}{suffix}"), core.control_system())
        };
        Self {
            status: point("StatusMsg"),
            power_on: point("PowerOn"),
            power_off: point("PowerOff"),
            fault_reset: point("FaultReset"),
            ps_volt_setpoint1: point("PSVoltSetpt1"),
            ps_volt_setpoint2: point("PSVoltSetpt2"),
            cal_start: point("CALSTRT"),
            cal_status: point("CALSTS"),
            cal_result: point("CALSTAT"),
            max_fwd_power: point("CALPWR"),
            measured_slope: point("SLOPE_NEW"),
            drive_max_setpoint: point("DRV_MAX_REQ"),
            saved_drive_max: point("DRV_MAX_SAVE"),
            core,
        }
    }

    fn status(&self) -> Result<Option<SsaStatus>> {
        Ok(SsaStatus::from_u8(self.status.get_i64()? as u8))
    }

    pub fn is_on(&self) -> Result<bool> {
        Ok(self.status()? == Some(SsaStatus::On))
    }

    fn is_faulted(&self) -> Result<bool> {
        Ok(self.status()?.is_some_and(|s| s.is_faulted()))
    }

    /// Saved drive max, falling back to the commissioning default when no
    /// calibration has been stored yet.
    pub fn drive_max(&self) -> Result<f64> {
        let saved = self.saved_drive_max.get_f64()?;
        if saved > 0.0 {
            Ok(saved)
        } else if self.core.is_hl() {
            Ok(SSA_DEFAULT_DRIVE_MAX_HL)
        } else {
            Ok(SSA_DEFAULT_DRIVE_MAX)
        }
    }

    pub fn turn_on(&self) -> Result<()> {
        if self.is_on()? {
            debug!(cavity = %self.core.label(), "SSA already on");
        } else {
            self.reset()?;
            info!(cavity = %self.core.label(), "powering SSA on");
            self.power_on.put(1i64)?;
            while !self.is_on()? {
                self.core.check_abort()?;
                self.core.sleep_rf_poll();
            }
        }
        if self.core.is_hl() {
            self.ps_volt_setpoint1.put(HL_SSA_PS_SETPOINT)?;
            self.ps_volt_setpoint2.put(HL_SSA_PS_SETPOINT)?;
        }
        Ok(())
    }

    pub fn turn_off(&self) -> Result<()> {
        if self.is_on()? {
            info!(cavity = %self.core.label(), "powering SSA off");
            self.power_off.put(1i64)?;
            while self.is_on()? {
                self.core.check_abort()?;
                self.core.sleep_rf_poll();
            }
        }
        Ok(())
    }

    /// Clear a fault with bounded reset attempts. A chassis that stays
    /// faulted through all attempts raises [`Error::SsaFault`].
    pub fn reset(&self) -> Result<()> {
        let mut attempt = 0u32;
        while self.is_faulted()? {
            if attempt >= INTERLOCK_RESET_ATTEMPTS {
                return Err(Error::SsaFault(format!(
                    "{} still faulted after {attempt} reset attempts",
                    self.core.label()
                )));
            }
            warn!(cavity = %self.core.label(), attempt, "resetting SSA fault");
            self.fault_reset.put(1i64)?;
            attempt += 1;
            while self.status()? == Some(SsaStatus::ResettingFaults) {
                self.core.check_abort()?;
                self.core.sleep_rf_poll();
            }
        }
        Ok(())
    }

    /// Calibrate at the requested drive max, retrying failed or
    /// out-of-tolerance runs a bounded number of times.
    pub fn calibrate(&self, drive_max: f64) -> Result<()> {
        if drive_max < SSA_DRIVE_MAX_LOWER_LIMIT {
            return Err(Error::SsaCalibration(format!(
                "requested drive max {drive_max} below minimum {SSA_DRIVE_MAX_LOWER_LIMIT}"
            )));
        }
        self.drive_max_setpoint.put(drive_max)?;
        let mut attempt = 0u32;
        loop {
            self.core.check_abort()?;
            match self.run_calibration(false) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_calibration_retryable() => {
                    if attempt >= SSA_CALIBRATION_RETRIES {
                        return Err(Error::SsaCalibration(format!(
                            "{} calibration gave up after {} attempts: {err}",
                            self.core.label(),
                            attempt + 1
                        )));
                    }
                    warn!(cavity = %self.core.label(), attempt, %err, "retrying SSA calibration");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One calibration run: reset, power on, clear cavity interlocks,
    /// start the firmware sequence and validate its results.
    pub fn run_calibration(&self, save_slope: bool) -> Result<()> {
        self.reset()?;
        self.turn_on()?;
        self.core.reset_interlocks()?;

        info!(cavity = %self.core.label(), "starting SSA calibration");
        self.cal_start.put(1i64)?;
        self.core.clock().sleep_secs(self.core.timing().run_start_settle_secs);
        while self.run_status()? == Some(RunStatus::Running) {
            self.core.check_abort()?;
            self.core.clock().sleep_secs(self.core.timing().run_poll_secs);
        }
        match self.run_status()? {
            Some(RunStatus::Complete) => {}
            Some(RunStatus::Crashed) => {
                return Err(Error::SsaCalibration(format!(
                    "{} calibration crashed",
                    self.core.label()
                )));
            }
            other => {
                return Err(Error::SsaCalibration(format!(
                    "{} calibration ended in unexpected status {other:?}",
                    self.core.label()
                )));
            }
        }

        // The run can finish without crashing and still flag a bad result.
        let result = self.cal_result.get_i64()?;
        if result != SSA_RESULT_GOOD_STATUS {
            return Err(Error::SsaCalibration(format!(
                "{} calibration finished with bad result status {result}",
                self.core.label()
            )));
        }

        let fwd_power = self.max_fwd_power.get_f64()?;
        let power_limit = if self.core.is_hl() {
            SSA_FWD_PWR_LOWER_LIMIT_HL
        } else {
            SSA_FWD_PWR_LOWER_LIMIT
        };
        if fwd_power < power_limit {
            return Err(Error::SsaCalibrationTolerance(format!(
                "{} forward power {fwd_power} W below {power_limit} W",
                self.core.label()
            )));
        }

        let slope = self.measured_slope.get_f64()?;
        if slope <= SSA_SLOPE_LOWER_LIMIT || slope >= SSA_SLOPE_UPPER_LIMIT {
            return Err(Error::SsaCalibrationTolerance(format!(
                "{} slope {slope} outside ({SSA_SLOPE_LOWER_LIMIT}, {SSA_SLOPE_UPPER_LIMIT})",
                self.core.label()
            )));
        }

        debug!(cavity = %self.core.label(), slope, fwd_power, "SSA calibration accepted");
        self.core.push_ssa_slope()?;
        if save_slope {
            self.core.save_ssa_slope()?;
        }
        Ok(())
    }

    fn run_status(&self) -> Result<Option<RunStatus>> {
        Ok(RunStatus::from_u8(self.cal_status.get_i64()? as u8))
    }
}
