//! Piezoelectric fast tuner controller.
//!
//! The piezo stack trims cavity resonance on millisecond scales, either
//! driven by the LLRF feedback loop or held at an externally set voltage.
//! Enabling is a deliberate disable/enable re-arm cycle; the amplifier
//! latches certain faults that only a full cycle clears.

use crate::cavity::CavityCore;
use crate::controls::ControlPoint;
use srf_common::consts::PIEZO_CENTER_VOLTAGE;
use srf_common::error::Result;
use srf_common::state::{PiezoEnable, PiezoMode};
use std::sync::Arc;
use tracing::{debug, info};

pub struct Piezo {
    core: Arc<CavityCore>,
    enable_ctrl: ControlPoint,
    enable_stat: ControlPoint,
    mode_ctrl: ControlPoint,
    mode_stat: ControlPoint,
    dc_setpoint: ControlPoint,
    feedback_setpoint: ControlPoint,
    bias_voltage: ControlPoint,
    voltage: ControlPoint,
}

impl Piezo {
    pub(crate) fn new(core: Arc<CavityCore>) -> Self {
        let prefix = format!("{}PZT:", core.id().prefix());
        let point = |suffix: &str| ControlPoint::new(format!("{prefix}{suffix}"), core.control_system());
        Self {
            enable_ctrl: point("ENABLE"),
            enable_stat: point("ENABLESTAT"),
            mode_ctrl: point("MODECTRL"),
            mode_stat: point("MODESTAT"),
            dc_setpoint: point("DAC_SP"),
            feedback_setpoint: point("INTEG_SP"),
            bias_voltage: point("BIAS"),
            voltage: point("V"),
            core,
        }
    }

    fn enable_state(&self) -> Result<Option<PiezoEnable>> {
        Ok(PiezoEnable::from_u8(self.enable_stat.get_i64()? as u8))
    }

    fn mode(&self) -> Result<Option<PiezoMode>> {
        Ok(PiezoMode::from_u8(self.mode_stat.get_i64()? as u8))
    }

    /// Amplifier output voltage readback [V].
    pub fn voltage(&self) -> Result<f64> {
        self.voltage.get_f64()
    }

    /// Bias voltage readback [V].
    pub fn bias_voltage(&self) -> Result<f64> {
        self.bias_voltage.get_f64()
    }

    pub fn set_dc_setpoint(&self, volts: f64) -> Result<()> {
        self.dc_setpoint.put(volts)
    }

    pub fn set_feedback_setpoint(&self, volts: f64) -> Result<()> {
        self.feedback_setpoint.put(volts)
    }

    /// Center the bias and cycle the amplifier until it reports enabled.
    pub fn enable(&self) -> Result<()> {
        self.bias_voltage.put(PIEZO_CENTER_VOLTAGE)?;
        while self.enable_state()? != Some(PiezoEnable::Enabled) {
            self.core.check_abort()?;
            debug!(cavity = %self.core.label(), "cycling piezo enable");
            self.enable_ctrl.put(PiezoEnable::Disabled as u8 as i64)?;
            self.settle();
            self.enable_ctrl.put(PiezoEnable::Enabled as u8 as i64)?;
            self.settle();
        }
        Ok(())
    }

    /// Enable the amplifier and drive the mode into closed loop.
    pub fn enable_feedback(&self) -> Result<()> {
        self.enable()?;
        while self.mode()? != Some(PiezoMode::Feedback) {
            self.core.check_abort()?;
            info!(cavity = %self.core.label(), "switching piezo to feedback");
            self.set_to_manual()?;
            self.settle();
            self.set_to_feedback()?;
            self.settle();
        }
        Ok(())
    }

    /// Drive the mode back to manual, mirroring [`Self::enable_feedback`].
    /// Mode commands only take on an armed amplifier, so this re-arms too.
    pub fn disable_feedback(&self) -> Result<()> {
        self.enable()?;
        while self.mode()? != Some(PiezoMode::Manual) {
            self.core.check_abort()?;
            info!(cavity = %self.core.label(), "switching piezo to manual");
            self.set_to_feedback()?;
            self.settle();
            self.set_to_manual()?;
            self.settle();
        }
        Ok(())
    }

    pub fn set_to_feedback(&self) -> Result<()> {
        self.mode_ctrl.put(PiezoMode::Feedback as u8 as i64)
    }

    pub fn set_to_manual(&self) -> Result<()> {
        self.mode_ctrl.put(PiezoMode::Manual as u8 as i64)
    }

    fn settle(&self) {
        self.core.clock().sleep_secs(self.core.timing().piezo_settle_secs);
    }
}
