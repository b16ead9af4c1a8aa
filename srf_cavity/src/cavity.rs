//! Per-cavity orchestrator.
//!
//! [`Cavity`] owns one SSA, one stepper tuner and one piezo tuner and
//! sequences the commissioning operations: interlock clearing, SSA
//! calibration, resonance auto-tune, characterization and the amplitude
//! ramp. The shared [`CavityCore`] carries the identity, configuration,
//! abort flag and cavity-level control points that the actuators also
//! need (abort checks, interlock resets, detune validation), so the
//! ownership graph stays a tree: `Cavity` → actuators → `Arc<CavityCore>`.
//!
//! All control logic is single-threaded blocking/polling per cavity.
//! Every polling loop checks the abort flag each iteration; distinct
//! cavities are fully independent and may run concurrently.

use crate::controls::{Clock, ControlPoint, ControlSystem, Severity};
use crate::piezo::Piezo;
use crate::ssa::Ssa;
use crate::stepper::StepperTuner;
use crate::tolerance::tolerance_factor;
use srf_common::abort::AbortFlag;
use srf_common::config::{TimingConfig, TuningConfig};
use srf_common::consts::{
    CAVITY_SCALE_LOWER_LIMIT, CAVITY_SCALE_LOWER_LIMIT_HL, CAVITY_SCALE_UPPER_LIMIT,
    CAVITY_SCALE_UPPER_LIMIT_HL, CHARACTERIZATION_REUSE_WINDOW_SECS, CHARACTERIZATION_STALE_SECS,
    DATA_DECIMATION_DEFAULT, DEFAULT_CHIRP_RANGE_HZ, HL_CRYOMODULES, INTERLOCK_RESET_ATTEMPTS,
    LOADED_Q_LOWER_LIMIT, LOADED_Q_LOWER_LIMIT_HL, LOADED_Q_UPPER_LIMIT, LOADED_Q_UPPER_LIMIT_HL,
    MAX_CHIRP_RANGE_HZ, MAX_STEPPER_SPEED, PIEZO_CENTER_VOLTAGE, PIEZO_CENTERING_TOLERANCE_HZ,
    PIEZO_HZ_PER_VOLT, SAFE_PULSED_DRIVE_LEVEL, TUNE_STEP_DAMPING, TUNE_TOLERANCE_HZ,
    TUNE_TOLERANCE_HZ_HL,
};
use srf_common::error::{Error, Result};
use srf_common::state::{HwMode, RfMode, RunStatus, TuneConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Position of one cavity in the accelerator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CavityId {
    pub linac: String,
    pub cryomodule: String,
    /// Cavity number within the cryomodule, 1-8.
    pub number: u8,
}

impl CavityId {
    pub fn new(linac: impl Into<String>, cryomodule: impl Into<String>, number: u8) -> Self {
        Self {
            linac: linac.into(),
            cryomodule: cryomodule.into(),
            number,
        }
    }

    /// True for the 3.9 GHz harmonic-linearizer cryomodules.
    pub fn is_hl(&self) -> bool {
        HL_CRYOMODULES.contains(&self.cryomodule.as_str())
    }

    /// Address prefix all of this cavity's control points hang off.
    pub fn prefix(&self) -> String {
        format!("ACCL:{}:{}{}0:", self.linac, self.cryomodule, self.number)
    }

    pub fn label(&self) -> String {
        format!("CM{} cavity {}", self.cryomodule, self.number)
    }
}

/// State and control points shared between the orchestrator and its
/// actuators.
pub struct CavityCore {
    id: CavityId,
    label: String,
    cs: Arc<dyn ControlSystem>,
    clock: Arc<dyn Clock>,
    config: TuningConfig,
    abort: AbortFlag,

    rf_mode_ctrl: ControlPoint,
    rf_mode: ControlPoint,
    rf_ctrl: ControlPoint,
    rf_state: ControlPoint,
    ades: ControlPoint,
    aact: ControlPoint,
    ades_max: ControlPoint,
    drive_level: ControlPoint,
    detune_best: ControlPoint,
    detune_chirp: ControlPoint,
    chirp_start: ControlPoint,
    chirp_stop: ControlPoint,
    tune_config: ControlPoint,
    interlock_reset: ControlPoint,
    rf_permit: ControlPoint,
    quench_latch: ControlPoint,
    hw_mode: ControlPoint,
    char_start: ControlPoint,
    char_status: ControlPoint,
    char_timestamp: ControlPoint,
    measured_loaded_q: ControlPoint,
    measured_scale: ControlPoint,
    push_loaded_q: ControlPoint,
    push_scale: ControlPoint,
    push_ssa_slope: ControlPoint,
    save_ssa_slope: ControlPoint,
    calc_probe_q: ControlPoint,
    decim_cw: ControlPoint,
    decim_pulsed: ControlPoint,
}

impl CavityCore {
    pub fn new(
        id: CavityId,
        cs: Arc<dyn ControlSystem>,
        clock: Arc<dyn Clock>,
        config: TuningConfig,
    ) -> Self {
        let prefix = id.prefix();
        let point = |suffix: &str| ControlPoint::new(format!("{prefix}{suffix}"), cs.clone());
        Self {
            label: id.label(),
            rf_mode_ctrl: point("RFMODECTRL"),
            rf_mode: point("RFMODE"),
            rf_ctrl: point("RFCTRL"),
            rf_state: point("RFSTATE"),
            ades: point("ADES"),
            aact: point("AACTMEAN"),
            ades_max: point("ADES_MAX"),
            drive_level: point("SEL_ASET"),
            detune_best: point("DFBEST"),
            detune_chirp: point("CHIRP:DF"),
            chirp_start: point("CHIRP:FREQ_START"),
            chirp_stop: point("CHIRP:FREQ_STOP"),
            tune_config: point("TUNE_CONFIG"),
            interlock_reset: point("INTLK_RESET_ALL"),
            rf_permit: point("RFPERMIT"),
            quench_latch: point("QUENCH_LTCH"),
            hw_mode: point("HWMODE"),
            char_start: point("PROBECALSTRT"),
            char_status: point("PROBECALSTS"),
            char_timestamp: point("PROBECALTS"),
            measured_loaded_q: point("QLOADED_NEW"),
            measured_scale: point("CAV:CAL_SCALEB_NEW"),
            push_loaded_q: point("PUSH_QLOADED.PROC"),
            push_scale: point("PUSH_CAV_SCALE.PROC"),
            push_ssa_slope: point("PUSH_SSA_SLOPE.PROC"),
            save_ssa_slope: point("SAVE_SSA_SLOPE.PROC"),
            calc_probe_q: point("QPROBE_CALC1.PROC"),
            decim_cw: point("ACQ_DECIM_SEL.A"),
            decim_pulsed: point("ACQ_DECIM_SEL.C"),
            id,
            cs,
            clock,
            config,
            abort: AbortFlag::new(),
        }
    }

    pub fn id(&self) -> &CavityId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_hl(&self) -> bool {
        self.id.is_hl()
    }

    pub fn control_system(&self) -> Arc<dyn ControlSystem> {
        self.cs.clone()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.config.timing
    }

    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.is_requested()
    }

    pub(crate) fn sleep_rf_poll(&self) {
        self.clock.sleep_secs(self.config.timing.rf_poll_secs);
    }

    /// Consume a pending abort request. Turns RF off first so the cavity
    /// unwinds into a safe state, then surfaces [`Error::Aborted`].
    pub fn check_abort(&self) -> Result<()> {
        if self.abort.take() {
            warn!(cavity = %self.label, "abort requested, turning RF off");
            // Best effort: the abort must surface even if the off
            // command cannot be delivered.
            let _ = self.rf_ctrl.put(0i64);
            return Err(Error::Aborted(format!("{} operation aborted", self.label)));
        }
        Ok(())
    }

    pub fn is_on(&self) -> Result<bool> {
        Ok(self.rf_state.get_i64()? == 1)
    }

    fn rf_mode(&self) -> Result<Option<RfMode>> {
        Ok(RfMode::from_u8(self.rf_mode.get_i64()? as u8))
    }

    fn hw_mode(&self) -> Result<Option<HwMode>> {
        Ok(HwMode::from_u8(self.hw_mode.get_i64()? as u8))
    }

    /// Amplitude readback [MV].
    pub fn measured_amplitude(&self) -> Result<f64> {
        self.aact.get_f64()
    }

    fn detune_point(&self) -> Result<&ControlPoint> {
        // In chirp mode the swept measurement is the only valid one.
        if self.rf_mode()? == Some(RfMode::Chirp) {
            Ok(&self.detune_chirp)
        } else {
            Ok(&self.detune_best)
        }
    }

    /// Detune readback [Hz] from whichever measurement matches the
    /// current RF mode.
    pub fn detune(&self) -> Result<f64> {
        self.detune_point()?.get_f64()
    }

    pub fn detune_invalid(&self) -> Result<bool> {
        Ok(self.detune_point()?.severity()? == Severity::Invalid)
    }

    /// Recover a lost detune measurement, or fail if recovery is not
    /// possible in the current mode.
    pub fn check_detune(&self) -> Result<()> {
        if !self.detune_invalid()? {
            return Ok(());
        }
        if self.rf_mode()? == Some(RfMode::Chirp) {
            let range = self.chirp_stop.get_f64()?;
            self.find_chirp_range(range * 1.1)
        } else {
            Err(Error::Detune(format!(
                "{} lost valid detune readback in closed loop",
                self.label
            )))
        }
    }

    fn set_chirp_range(&self, range_hz: f64) -> Result<()> {
        debug!(cavity = %self.label, range_hz, "programming chirp window");
        self.chirp_start.put(-range_hz)?;
        self.chirp_stop.put(range_hz)?;
        Ok(())
    }

    /// Widen the chirp window until the detune measurement is valid.
    pub fn find_chirp_range(&self, range_hz: f64) -> Result<()> {
        let mut range_hz = range_hz;
        loop {
            self.check_abort()?;
            self.set_chirp_range(range_hz)?;
            self.clock.sleep_secs(self.config.timing.chirp_settle_secs);
            if !self.detune_invalid()? {
                return Ok(());
            }
            range_hz *= 1.1;
            if range_hz > MAX_CHIRP_RANGE_HZ {
                return Err(Error::Detune(format!(
                    "{} found no valid detune within the maximum chirp window",
                    self.label
                )));
            }
            warn!(cavity = %self.label, range_hz, "detune invalid, widening chirp window");
        }
    }

    /// Clear latched interlocks with a bounded, linearly backed-off
    /// retry sequence.
    pub fn reset_interlocks(&self) -> Result<()> {
        info!(cavity = %self.label, "resetting interlocks");
        let timing = &self.config.timing;
        let mut wait = timing.interlock_wait_base_secs;
        let mut attempt = 0u32;
        loop {
            self.interlock_reset.put(1i64)?;
            self.clock.sleep_secs(wait);
            if self.rf_permit.get_i64()? != 0 {
                return Ok(());
            }
            attempt += 1;
            if attempt >= INTERLOCK_RESET_ATTEMPTS {
                return Err(Error::CavityFault(format!(
                    "{} interlocks still latched after {attempt} reset attempts",
                    self.label
                )));
            }
            wait += timing.interlock_wait_increment_secs;
        }
    }

    fn quench_latched(&self) -> Result<bool> {
        Ok(self.quench_latch.get_i64()? != 0)
    }

    fn set_tune_config(&self, config: TuneConfig) -> Result<()> {
        self.tune_config.put(config as u8 as i64)
    }

    /// Restore the waveform acquisition decimation after a run that
    /// reprogrammed it.
    pub fn reset_data_decimation(&self) -> Result<()> {
        self.decim_cw.put(DATA_DECIMATION_DEFAULT)?;
        self.decim_pulsed.put(DATA_DECIMATION_DEFAULT)?;
        Ok(())
    }

    /// Push the freshly measured SSA slope to the hardware feedback side.
    pub fn push_ssa_slope(&self) -> Result<()> {
        self.push_ssa_slope.put(1i64)
    }

    pub fn save_ssa_slope(&self) -> Result<()> {
        self.save_ssa_slope.put(1i64)
    }
}

/// One cavity with its three actuators.
pub struct Cavity {
    core: Arc<CavityCore>,
    ssa: Ssa,
    stepper: StepperTuner,
    piezo: Piezo,
}

impl Cavity {
    pub fn new(
        id: CavityId,
        cs: Arc<dyn ControlSystem>,
        clock: Arc<dyn Clock>,
        config: TuningConfig,
    ) -> Self {
        let core = Arc::new(CavityCore::new(id, cs, clock, config));
        Self {
            ssa: Ssa::new(core.clone()),
            stepper: StepperTuner::new(core.clone()),
            piezo: Piezo::new(core.clone()),
            core,
        }
    }

    pub fn core(&self) -> &Arc<CavityCore> {
        &self.core
    }

    pub fn id(&self) -> &CavityId {
        self.core.id()
    }

    pub fn ssa(&self) -> &Ssa {
        &self.ssa
    }

    pub fn stepper(&self) -> &StepperTuner {
        &self.stepper
    }

    pub fn piezo(&self) -> &Piezo {
        &self.piezo
    }

    /// Handle for requesting cooperative cancellation from outside the
    /// blocking control loop.
    pub fn abort_flag(&self) -> AbortFlag {
        self.core.abort_flag()
    }

    pub fn is_on(&self) -> Result<bool> {
        self.core.is_on()
    }

    pub fn set_rf_mode(&self, mode: RfMode) -> Result<()> {
        debug!(cavity = %self.core.label(), ?mode, "commanding RF mode");
        self.core.rf_mode_ctrl.put(mode as u8 as i64)
    }

    /// Bring RF up: SSA on, interlocks cleared, RF commanded on and
    /// confirmed via the state readback. Refused unless the cavity is
    /// online.
    pub fn turn_on(&self) -> Result<()> {
        match self.core.hw_mode()? {
            Some(HwMode::Online) => {}
            other => {
                return Err(Error::HwMode(format!(
                    "{} is not online ({other:?})",
                    self.core.label()
                )));
            }
        }
        self.ssa.turn_on()?;
        self.core.reset_interlocks()?;
        info!(cavity = %self.core.label(), "turning RF on");
        self.core.rf_ctrl.put(1i64)?;
        while !self.core.is_on()? {
            self.core.check_abort()?;
            self.core.sleep_rf_poll();
        }
        Ok(())
    }

    pub fn turn_off(&self) -> Result<()> {
        info!(cavity = %self.core.label(), "turning RF off");
        self.core.rf_ctrl.put(0i64)?;
        while self.core.is_on()? {
            self.core.check_abort()?;
            self.core.sleep_rf_poll();
        }
        Ok(())
    }

    /// Converge `delta_fn` toward zero with damped proportional stepper
    /// moves. `delta_fn` is the tuning error in hertz; a run whose total
    /// motion exceeds the initial estimate by more than the tolerance
    /// factor is treated as a runaway.
    pub fn auto_tune(
        &self,
        delta_fn: &mut dyn FnMut() -> Result<f64>,
        tolerance_hz: f64,
        reset_signed_steps: bool,
    ) -> Result<()> {
        if self.core.detune_invalid()? {
            return Err(Error::Detune(format!(
                "{} has no valid detune readback to tune on",
                self.core.label()
            )));
        }
        let microsteps_per_hz = self.stepper.microsteps_per_hz()?;
        let mut delta_hz = delta_fn()?;
        let expected_steps = (delta_hz * microsteps_per_hz).abs();
        let overshoot_factor = tolerance_factor(expected_steps);
        if reset_signed_steps {
            self.stepper.reset_signed_steps()?;
        }
        self.core.set_tune_config(TuneConfig::Other)?;

        let mut total_moved = 0.0;
        while delta_hz.abs() > tolerance_hz {
            self.core.check_abort()?;
            let est_steps = (TUNE_STEP_DAMPING * delta_hz * microsteps_per_hz).trunc() as i64;
            debug!(cavity = %self.core.label(), delta_hz, est_steps, "auto-tune step");
            let bound = ((est_steps.abs() as f64) * 1.1).ceil() as i64;
            self.stepper
                .move_steps(est_steps, bound, MAX_STEPPER_SPEED, true, true)?;
            total_moved += est_steps.abs() as f64;
            if total_moved > expected_steps * overshoot_factor {
                return Err(Error::Detune(format!(
                    "{} moved {total_moved} steps without converging (expected ~{expected_steps})",
                    self.core.label()
                )));
            }
            self.core.check_detune()?;
            delta_hz = delta_fn()?;
        }
        Ok(())
    }

    /// Condition the cavity for a tuning campaign: piezo armed, then
    /// either a chirp detune measurement or closed-loop SELA drive.
    fn setup_tuning(&self, chirp_range_hz: f64, use_sela: bool) -> Result<()> {
        self.piezo.enable()?;
        if use_sela {
            self.piezo.enable_feedback()?;
            self.set_rf_mode(RfMode::Sela)?;
            self.turn_on()?;
        } else {
            self.piezo.disable_feedback()?;
            self.piezo.set_dc_setpoint(0.0)?;
            self.core.drive_level.put(SAFE_PULSED_DRIVE_LEVEL)?;
            self.set_rf_mode(RfMode::Chirp)?;
            self.turn_on()?;
            // Give the swept measurement time to produce a first value.
            self.core
                .clock()
                .sleep_secs(self.core.timing().detune_catchup_secs);
            self.core.find_chirp_range(chirp_range_hz)?;
        }
        Ok(())
    }

    /// Tune the cavity onto resonance. In SELA the piezo is afterwards
    /// re-centered by walking the stepper against the piezo voltage.
    pub fn move_to_resonance(&self, reset_signed_steps: bool, use_sela: bool) -> Result<()> {
        self.setup_tuning(DEFAULT_CHIRP_RANGE_HZ, use_sela)?;
        let tolerance_hz = if self.core.is_hl() {
            TUNE_TOLERANCE_HZ_HL
        } else {
            TUNE_TOLERANCE_HZ
        };
        self.auto_tune(&mut || self.core.detune(), tolerance_hz, reset_signed_steps)?;

        if use_sela {
            let sign = if self.core.is_hl() { -1.0 } else { 1.0 };
            self.auto_tune(
                &mut || {
                    Ok(sign * PIEZO_HZ_PER_VOLT * (self.piezo.voltage()? - PIEZO_CENTER_VOLTAGE))
                },
                PIEZO_CENTERING_TOLERANCE_HZ,
                false,
            )?;
        }
        self.core.set_tune_config(TuneConfig::Resonance)?;
        info!(cavity = %self.core.label(), "on resonance");
        Ok(())
    }

    /// Measure loaded Q and the probe scale factor, reusing a
    /// just-finished run when one is available.
    pub fn characterize(&self) -> Result<()> {
        self.core.reset_interlocks()?;
        self.core.drive_level.put(SAFE_PULSED_DRIVE_LEVEL)?;

        let age = self.core.clock().epoch_secs() - self.core.char_timestamp.get_f64()?;
        if age < CHARACTERIZATION_REUSE_WINDOW_SECS
            && self.char_status()? == Some(RunStatus::Complete)
        {
            info!(cavity = %self.core.label(), age, "reusing recent characterization");
            return self.finish_characterization();
        }

        info!(cavity = %self.core.label(), "starting characterization");
        self.core.char_start.put(1i64)?;
        self.core
            .clock()
            .sleep_secs(self.core.timing().run_start_settle_secs);
        while self.char_status()? == Some(RunStatus::Running) {
            self.core.check_abort()?;
            self.core
                .clock()
                .sleep_secs(self.core.timing().run_poll_secs);
        }
        match self.char_status()? {
            Some(RunStatus::Complete) => {
                let age = self.core.clock().epoch_secs() - self.core.char_timestamp.get_f64()?;
                if age > CHARACTERIZATION_STALE_SECS {
                    return Err(Error::Characterization(format!(
                        "{} characterization result is {age:.0} s old",
                        self.core.label()
                    )));
                }
                self.finish_characterization()
            }
            Some(RunStatus::Crashed) => Err(Error::Characterization(format!(
                "{} characterization crashed",
                self.core.label()
            ))),
            other => Err(Error::Characterization(format!(
                "{} characterization ended in unexpected status {other:?}",
                self.core.label()
            ))),
        }
    }

    fn char_status(&self) -> Result<Option<RunStatus>> {
        Ok(RunStatus::from_u8(self.core.char_status.get_i64()? as u8))
    }

    /// Validate and push the characterization results.
    pub fn finish_characterization(&self) -> Result<()> {
        let loaded_q = self.core.measured_loaded_q.get_f64()?;
        let (q_lo, q_hi) = if self.core.is_hl() {
            (LOADED_Q_LOWER_LIMIT_HL, LOADED_Q_UPPER_LIMIT_HL)
        } else {
            (LOADED_Q_LOWER_LIMIT, LOADED_Q_UPPER_LIMIT)
        };
        if !(q_lo..=q_hi).contains(&loaded_q) {
            return Err(Error::QLoaded(format!(
                "{} loaded Q {loaded_q:e} outside [{q_lo:e}, {q_hi:e}]",
                self.core.label()
            )));
        }
        self.core.push_loaded_q.put(1i64)?;

        let scale = self.core.measured_scale.get_f64()?;
        let (s_lo, s_hi) = if self.core.is_hl() {
            (CAVITY_SCALE_LOWER_LIMIT_HL, CAVITY_SCALE_UPPER_LIMIT_HL)
        } else {
            (CAVITY_SCALE_LOWER_LIMIT, CAVITY_SCALE_UPPER_LIMIT)
        };
        if !(s_lo..=s_hi).contains(&scale) {
            return Err(Error::ScaleFactor(format!(
                "{} scale factor {scale} outside [{s_lo}, {s_hi}]",
                self.core.label()
            )));
        }
        self.core.push_scale.put(1i64)?;

        self.core.reset_data_decimation()?;
        self.piezo.set_feedback_setpoint(0.0)?;
        info!(cavity = %self.core.label(), loaded_q, scale, "characterization accepted");
        Ok(())
    }

    /// Ramp the amplitude setpoint to `target_amp` in `step` increments,
    /// stopping immediately on a latched quench.
    pub fn walk_amp(&self, target_amp: f64, step: f64) -> Result<()> {
        info!(cavity = %self.core.label(), target_amp, step, "walking amplitude");
        while self.core.ades.get_f64()? <= target_amp - step {
            self.core.check_abort()?;
            if self.core.quench_latched()? {
                return Err(Error::Quench(format!(
                    "{} quench latched during amplitude ramp",
                    self.core.label()
                )));
            }
            let next = self.core.ades.get_f64()? + step;
            self.core.ades.put(next)?;
            self.core
                .clock()
                .sleep_secs(self.core.timing().amp_ramp_settle_secs);
        }
        if self.core.ades.get_f64()? != target_amp {
            self.core.ades.put(target_amp)?;
        }
        Ok(())
    }

    /// Full commissioning sequence to the requested amplitude, ending in
    /// SELA. Any failure leaves the cavity with RF commanded off.
    pub fn setup_rf(&self, desired_amp: f64) -> Result<()> {
        if let Err(err) = self.run_setup_rf(desired_amp) {
            // Safe-state rule: no fatal path leaves RF driving the cavity.
            let _ = self.core.rf_ctrl.put(0i64);
            return Err(err);
        }
        Ok(())
    }

    fn run_setup_rf(&self, desired_amp: f64) -> Result<()> {
        let amp_limit = self.core.ades_max.get_f64()?;
        let amp = if desired_amp > amp_limit {
            warn!(
                cavity = %self.core.label(),
                desired_amp, amp_limit, "clamping requested amplitude"
            );
            amp_limit
        } else {
            desired_amp
        };
        info!(cavity = %self.core.label(), amp, "setting up RF");

        self.turn_off()?;
        self.ssa.calibrate(self.ssa.drive_max()?)?;
        self.move_to_resonance(false, false)?;
        self.characterize()?;
        self.core.calc_probe_q.put(1i64)?;
        self.core.reset_data_decimation()?;

        self.core.ades.put(amp.min(5.0))?;
        self.set_rf_mode(RfMode::Sel)?;
        self.piezo.enable_feedback()?;
        self.set_rf_mode(RfMode::Sela)?;

        // Coarse ramp to 10 MV, fine steps above: the quench interlock
        // gets touchier as gradient rises.
        if amp > 10.0 {
            self.walk_amp(10.0, 0.5)?;
            self.walk_amp(amp, 0.1)?;
        } else {
            self.walk_amp(amp, 0.5)?;
        }
        Ok(())
    }

    pub fn setup_sela(&self, desired_amp: f64) -> Result<()> {
        self.setup_rf(desired_amp)
    }

    pub fn setup_selap(&self, desired_amp: f64) -> Result<()> {
        self.setup_rf(desired_amp)?;
        self.set_rf_mode(RfMode::Selap)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sim_cavity;
    use super::*;
    use crate::controls::Value;

    #[test]
    fn cavity_id_prefix_and_hl() {
        let id = CavityId::new("L1B", "H1", 5);
        assert_eq!(id.prefix(), "ACCL:L1B:H150:");
        assert!(id.is_hl());
        assert!(!CavityId::new("L0B", "01", 1).is_hl());
    }

    #[test]
    fn interlock_reset_backs_off_then_faults() {
        let (cavity, sim, clock) = sim_cavity("L0B", "01", 1);
        // RF permit stays inhibited.
        sim.set("ACCL:L0B:0110:RFPERMIT", 0i64);

        let err = cavity.core().reset_interlocks().unwrap_err();
        assert!(matches!(err, Error::CavityFault(_)));
        assert_eq!(sim.write_count("ACCL:L0B:0110:INTLK_RESET_ALL"), 5);
        assert_eq!(clock.sleeps(), vec![3.0, 5.0, 7.0, 9.0, 11.0]);
    }

    #[test]
    fn interlock_reset_returns_once_permitted() {
        let (cavity, sim, clock) = sim_cavity("L0B", "01", 1);
        sim.script_values("ACCL:L0B:0110:RFPERMIT", [0.0, 1.0]);

        cavity.core().reset_interlocks().unwrap();
        assert_eq!(sim.write_count("ACCL:L0B:0110:INTLK_RESET_ALL"), 2);
        assert_eq!(clock.sleeps(), vec![3.0, 5.0]);
    }

    #[test]
    fn check_abort_turns_rf_off() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        cavity.abort_flag().request();

        let err = cavity.core().check_abort().unwrap_err();
        assert!(err.is_abort());
        assert_eq!(sim.writes_to("ACCL:L0B:0110:RFCTRL"), vec![Value::Int(0)]);
        // Edge-triggered: the next check starts clean.
        cavity.core().check_abort().unwrap();
    }

    #[test]
    fn walk_amp_stops_on_quench_without_overshooting() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:ADES", 15.8);
        // Quench latches once the setpoint reaches 16.0.
        sim.script_values("ACCL:L0B:0110:QUENCH_LTCH", [0.0, 0.0, 1.0]);

        let err = cavity.walk_amp(16.6, 0.1).unwrap_err();
        assert!(matches!(err, Error::Quench(_)));
        for written in sim.writes_to("ACCL:L0B:0110:ADES") {
            assert!(written.as_f64().unwrap() <= 16.0);
        }
    }

    #[test]
    fn walk_amp_lands_exactly_on_target() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:ADES", 0.0);
        cavity.walk_amp(1.6, 0.5).unwrap();
        let writes = sim.writes_to("ACCL:L0B:0110:ADES");
        let last = writes.last().unwrap().as_f64().unwrap();
        assert_eq!(last, 1.6);
        // Three full steps plus the final exact write.
        assert_eq!(writes.len(), 4);
    }

    #[test]
    fn auto_tune_converges_after_one_move() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:STEP:SCALE", 0.1);
        let mut calls = 0u32;
        let mut delta_fn = move || {
            calls += 1;
            Ok(if calls == 1 { 800.0 } else { 20.0 })
        };

        cavity.auto_tune(&mut delta_fn, 50.0, false).unwrap();
        // 0.9 * 800 Hz * 10 steps/Hz = 7200 steps, one bounded move.
        assert_eq!(sim.write_count("ACCL:L0B:0110:STEP:MOV_REQ_POS"), 1);
        assert_eq!(
            sim.writes_to("ACCL:L0B:0110:STEP:NSTEPS"),
            vec![Value::Int(7200)]
        );
    }

    #[test]
    fn auto_tune_rejects_invalid_detune() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set_invalid("ACCL:L0B:0110:DFBEST", 0.0);
        let err = cavity
            .auto_tune(&mut || Ok(800.0), 50.0, false)
            .unwrap_err();
        assert!(matches!(err, Error::Detune(_)));
    }

    #[test]
    fn auto_tune_detects_runaway() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:STEP:SCALE", 0.1);
        // The detune never improves no matter how far the tuner moves.
        let err = cavity
            .auto_tune(&mut || Ok(800.0), 50.0, false)
            .unwrap_err();
        assert!(matches!(err, Error::Detune(_)));
    }

    #[test]
    fn chirp_search_widens_then_gives_up() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:RFMODE", RfMode::Chirp as i64);
        sim.set_invalid("ACCL:L0B:0110:CHIRP:DF", 0.0);

        let err = cavity.core().find_chirp_range(50_000.0).unwrap_err();
        assert!(matches!(err, Error::Detune(_)));
        let windows = sim.writes_to("ACCL:L0B:0110:CHIRP:FREQ_STOP");
        assert!(windows.len() > 5);
        for window in &windows {
            assert!(window.as_f64().unwrap() <= MAX_CHIRP_RANGE_HZ);
        }
    }

    #[test]
    fn chirp_search_stops_once_detune_is_valid() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:RFMODE", RfMode::Chirp as i64);
        sim.script(
            "ACCL:L0B:0110:CHIRP:DF",
            [
                crate::controls::Reading::invalid(0.0),
                crate::controls::Reading::valid(1200.0),
            ],
        );

        cavity.core().find_chirp_range(50_000.0).unwrap();
        let windows = sim.writes_to("ACCL:L0B:0110:CHIRP:FREQ_STOP");
        assert_eq!(windows.len(), 2);
        assert!((windows[1].as_f64().unwrap() - 55_000.0).abs() < 1e-6);
    }

    #[test]
    fn turn_on_refused_when_not_online() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:HWMODE", HwMode::Offline as i64);
        let err = cavity.turn_on().unwrap_err();
        assert!(matches!(err, Error::HwMode(_)));
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn characterize_reuses_a_fresh_run() {
        let (cavity, sim, clock) = sim_cavity("L0B", "01", 1);
        clock.set_epoch(1_000.0);
        sim.set("ACCL:L0B:0110:RFPERMIT", 1i64);
        sim.set("ACCL:L0B:0110:PROBECALTS", 970.0);
        sim.set("ACCL:L0B:0110:PROBECALSTS", RunStatus::Complete as i64);
        sim.set("ACCL:L0B:0110:QLOADED_NEW", 4.0e7);
        sim.set("ACCL:L0B:0110:CAV:CAL_SCALEB_NEW", 30.0);

        cavity.characterize().unwrap();
        // No new run was started.
        assert_eq!(sim.write_count("ACCL:L0B:0110:PROBECALSTRT"), 0);
        assert_eq!(sim.write_count("ACCL:L0B:0110:PUSH_QLOADED.PROC"), 1);
        assert_eq!(sim.write_count("ACCL:L0B:0110:PUSH_CAV_SCALE.PROC"), 1);
        // Feedback setpoint zeroed at the end.
        assert_eq!(
            sim.writes_to("ACCL:L0B:0110:PZT:INTEG_SP"),
            vec![Value::Float(0.0)]
        );
    }

    #[test]
    fn characterize_rejects_a_stale_result() {
        let (cavity, sim, clock) = sim_cavity("L0B", "01", 1);
        clock.set_epoch(1_000.0);
        sim.set("ACCL:L0B:0110:RFPERMIT", 1i64);
        // Timestamp never updates, so the finished run reads as stale.
        sim.set("ACCL:L0B:0110:PROBECALTS", 100.0);
        sim.set("ACCL:L0B:0110:PROBECALSTS", RunStatus::Running as i64);
        sim.script_values(
            "ACCL:L0B:0110:PROBECALSTS",
            [2.0, 2.0, 1.0, 1.0],
        );

        let err = cavity.characterize().unwrap_err();
        assert!(matches!(err, Error::Characterization(_)));
        assert_eq!(sim.write_count("ACCL:L0B:0110:PROBECALSTRT"), 1);
    }

    #[test]
    fn characterize_surfaces_a_crash() {
        let (cavity, sim, clock) = sim_cavity("L0B", "01", 1);
        clock.set_epoch(1_000.0);
        sim.set("ACCL:L0B:0110:RFPERMIT", 1i64);
        sim.set("ACCL:L0B:0110:PROBECALTS", 100.0);
        sim.set("ACCL:L0B:0110:PROBECALSTS", RunStatus::Crashed as i64);

        let err = cavity.characterize().unwrap_err();
        assert!(matches!(err, Error::Characterization(_)));
    }

    #[test]
    fn finish_characterization_rejects_bad_loaded_q() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:QLOADED_NEW", 1.0e7);
        let err = cavity.finish_characterization().unwrap_err();
        assert!(matches!(err, Error::QLoaded(_)));
        assert_eq!(sim.write_count("ACCL:L0B:0110:PUSH_QLOADED.PROC"), 0);
    }

    #[test]
    fn finish_characterization_rejects_bad_scale() {
        let (cavity, sim, _clock) = sim_cavity("L0B", "01", 1);
        sim.set("ACCL:L0B:0110:QLOADED_NEW", 4.0e7);
        sim.set("ACCL:L0B:0110:CAV:CAL_SCALEB_NEW", 300.0);
        let err = cavity.finish_characterization().unwrap_err();
        assert!(matches!(err, Error::ScaleFactor(_)));
        // Loaded Q was accepted and pushed before the scale check.
        assert_eq!(sim.write_count("ACCL:L0B:0110:PUSH_QLOADED.PROC"), 1);
        assert_eq!(sim.write_count("ACCL:L0B:0110:PUSH_CAV_SCALE.PROC"), 0);
    }
}
