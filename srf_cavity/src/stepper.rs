//! Mechanical (stepper) tuner controller.
//!
//! Coarse resonance control: the motor deforms the cavity through a
//! gearbox, at a calibrated detune sensitivity of hertz per microstep.
//! Large requests are split into bounded chunks so the controller's
//! per-move step limit is never exceeded, and every stop is checked
//! against the limit switches — a motor can stop because it finished or
//! because it ran into a hard limit, and only the switches tell the two
//! apart.

use crate::cavity::CavityCore;
use crate::controls::ControlPoint;
use srf_common::consts::{
    DEFAULT_STEPPER_MAX_STEPS, DEFAULT_STEPPER_SPEED, MAX_STEPPER_SPEED,
    STEPPER_ON_LIMIT_SWITCH_VALUE,
};
use srf_common::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub struct StepperTuner {
    core: Arc<CavityCore>,
    step_des: ControlPoint,
    move_pos: ControlPoint,
    move_neg: ControlPoint,
    motor_abort: ControlPoint,
    motor_moving: ControlPoint,
    limit_switch_a: ControlPoint,
    limit_switch_b: ControlPoint,
    speed: ControlPoint,
    max_steps: ControlPoint,
    hz_per_microstep: ControlPoint,
    reset_signed: ControlPoint,
}

impl StepperTuner {
    pub(crate) fn new(core: Arc<CavityCore>) -> Self {
        let prefix = format!("{}STEP:", core.id().prefix());
        let point = |suffix: &str| ControlPoint::new(format!("{prefix}{suffix}"), core.control_system());
        Self {
            step_des: point("NSTEPS"),
            move_pos: point("MOV_REQ_POS"),
            move_neg: point("MOV_REQ_NEG"),
            motor_abort: point("ABORT_REQ"),
            motor_moving: point("STAT_MOV"),
            limit_switch_a: point("STAT_LIMA"),
            limit_switch_b: point("STAT_LIMB"),
            speed: point("VELO"),
            max_steps: point("NSTEPS_MAX"),
            hz_per_microstep: point("SCALE"),
            reset_signed: point("TOTSGN_RESET"),
            core,
        }
    }

    /// Calibrated detune sensitivity magnitude [Hz/microstep].
    pub fn hz_per_microstep(&self) -> Result<f64> {
        Ok(self.hz_per_microstep.get_f64()?.abs())
    }

    /// Microsteps needed per hertz of detune.
    pub fn microsteps_per_hz(&self) -> Result<f64> {
        let scale = self.hz_per_microstep()?;
        if scale == 0.0 {
            return Err(Error::Stepper(format!(
                "{} tuner has no stored step calibration",
                self.core.label()
            )));
        }
        Ok(1.0 / scale)
    }

    /// Zero the signed step counter before a tracked move campaign.
    pub fn reset_signed_steps(&self) -> Result<()> {
        self.reset_signed.put(1i64)
    }

    pub fn restore_defaults(&self) -> Result<()> {
        self.speed.put(DEFAULT_STEPPER_SPEED as i64)?;
        self.max_steps.put(DEFAULT_STEPPER_MAX_STEPS)?;
        Ok(())
    }

    /// Move by `num_steps` signed microsteps, splitting the request into
    /// chunks of at most `max_steps` so the per-move limit written to the
    /// controller is honored. Default speed and limits are restored once
    /// the whole request has been consumed.
    pub fn move_steps(
        &self,
        num_steps: i64,
        max_steps: i64,
        speed: u32,
        change_limits: bool,
        check_detune: bool,
    ) -> Result<()> {
        self.check_abort()?;
        let cap = max_steps.abs().max(1);
        if change_limits {
            self.speed.put(speed.min(MAX_STEPPER_SPEED) as i64)?;
            self.max_steps.put(cap)?;
        }
        info!(cavity = %self.core.label(), num_steps, cap, "moving stepper tuner");
        let mut remaining = num_steps;
        while remaining != 0 {
            let chunk = remaining.clamp(-cap, cap);
            self.step_des.put(chunk.abs())?;
            self.issue_move_command(chunk, check_detune)?;
            remaining -= chunk;
        }
        self.restore_defaults()
    }

    /// Fire one bounded move and wait for the motor to stop.
    fn issue_move_command(&self, num_steps: i64, check_detune: bool) -> Result<()> {
        // HL tuners are mounted mirrored and move the opposite direction.
        let num_steps = if self.core.is_hl() { -num_steps } else { num_steps };
        if num_steps >= 0 {
            self.move_pos.put(1i64)?;
        } else {
            self.move_neg.put(1i64)?;
        }
        debug!(cavity = %self.core.label(), num_steps, "move command issued");
        self.core.clock().sleep_secs(self.core.timing().stepper_settle_secs);

        while self.motor_moving.get_i64()? != 0 {
            self.check_abort()?;
            if check_detune {
                self.core.check_detune()?;
            }
            self.core.clock().sleep_secs(self.core.timing().stepper_poll_secs);
        }

        if self.on_limit_switch()? {
            return Err(Error::Stepper(format!(
                "{} stepper stopped on a limit switch",
                self.core.label()
            )));
        }
        Ok(())
    }

    fn on_limit_switch(&self) -> Result<bool> {
        Ok(self.limit_switch_a.get_i64()? == STEPPER_ON_LIMIT_SWITCH_VALUE
            || self.limit_switch_b.get_i64()? == STEPPER_ON_LIMIT_SWITCH_VALUE)
    }

    /// Abort check that also halts the motor before unwinding.
    fn check_abort(&self) -> Result<()> {
        if self.core.abort_requested() {
            self.motor_abort.put(1i64)?;
        }
        self.core.check_abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cavity::test_support::sim_cavity;
    use crate::controls::Value;
    use srf_common::consts::DEFAULT_STEPPER_MAX_STEPS;

    #[test]
    fn splits_oversized_moves_into_bounded_chunks() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        cavity
            .stepper()
            .move_steps(250, 100, 20_000, true, false)
            .unwrap();

        // Exactly three bounded move commands, magnitudes summing to 250.
        assert_eq!(sim.write_count("ACCL:L0B:0110:STEP:MOV_REQ_POS"), 3);
        assert_eq!(sim.write_count("ACCL:L0B:0110:STEP:MOV_REQ_NEG"), 0);
        let chunks = sim.writes_to("ACCL:L0B:0110:STEP:NSTEPS");
        let magnitudes: Vec<i64> = chunks.iter().filter_map(|v| v.as_i64()).collect();
        assert_eq!(magnitudes, vec![100, 100, 50]);
        assert!(magnitudes.iter().all(|&m| m <= 100));
        assert_eq!(magnitudes.iter().sum::<i64>(), 250);
    }

    #[test]
    fn negative_moves_use_the_negative_command() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        cavity
            .stepper()
            .move_steps(-150, 100, 20_000, true, false)
            .unwrap();
        assert_eq!(sim.write_count("ACCL:L0B:0110:STEP:MOV_REQ_NEG"), 2);
        assert_eq!(sim.write_count("ACCL:L0B:0110:STEP:MOV_REQ_POS"), 0);
    }

    #[test]
    fn hl_cavities_invert_the_move_direction() {
        let (cavity, sim, _clock) = sim_cavity("L1B", "H1", 2);
        cavity
            .stepper()
            .move_steps(50, 100, 20_000, true, false)
            .unwrap();
        assert_eq!(sim.write_count("ACCL:L1B:H120:STEP:MOV_REQ_NEG"), 1);
        assert_eq!(sim.write_count("ACCL:L1B:H120:STEP:MOV_REQ_POS"), 0);
    }

    #[test]
    fn speed_is_capped_and_defaults_restored() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        cavity
            .stepper()
            .move_steps(10, 100, 90_000, true, false)
            .unwrap();
        assert_eq!(
            sim.writes_to("ACCL:L0B:0110:STEP:VELO"),
            vec![
                Value::Int(MAX_STEPPER_SPEED as i64),
                Value::Int(DEFAULT_STEPPER_SPEED as i64)
            ]
        );
        assert_eq!(
            sim.writes_to("ACCL:L0B:0110:STEP:NSTEPS_MAX"),
            vec![Value::Int(100), Value::Int(DEFAULT_STEPPER_MAX_STEPS)]
        );
    }

    #[test]
    fn limit_switch_stop_is_a_fault() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:STEP:STAT_LIMB", 1i64);
        let err = cavity
            .stepper()
            .move_steps(10, 100, 20_000, true, false)
            .unwrap_err();
        assert!(matches!(err, Error::Stepper(_)));
    }

    #[test]
    fn abort_halts_the_motor() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        cavity.abort_flag().request();
        let err = cavity
            .stepper()
            .move_steps(10, 100, 20_000, true, false)
            .unwrap_err();
        assert!(err.is_abort());
        assert_eq!(sim.write_count("ACCL:L0B:0110:STEP:ABORT_REQ"), 1);
    }

    #[test]
    fn zero_scale_has_no_calibration() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:STEP:SCALE", 0.0);
        assert!(cavity.stepper().microsteps_per_hz().is_err());
        sim.set("ACCL:L0B:0110:STEP:SCALE", -0.1);
        let per_hz = cavity.stepper().microsteps_per_hz().unwrap();
        assert!((per_hz - 10.0).abs() < 1e-9);
    }
}
