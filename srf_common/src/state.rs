//! Status and mode enums as reported by the LLRF and SSA firmware.
//!
//! All enums use `#[repr(u8)]` with the raw codes the firmware publishes on
//! its status control points, plus `from_u8` for decoding readbacks.
//! Unknown codes decode to `None` and are treated as "not in the state we
//! are waiting for" by the polling loops.

use serde::{Deserialize, Serialize};

/// SSA chassis status readback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SsaStatus {
    /// Faulted, awaiting reset.
    Faulted = 1,
    /// Powered off.
    Off = 2,
    /// Powered on and ready for RF.
    On = 3,
    /// Fault reset sequence in progress.
    ResettingFaults = 4,
    /// A previous fault reset did not clear the fault.
    FaultResetFailed = 7,
}

impl SsaStatus {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Faulted),
            2 => Some(Self::Off),
            3 => Some(Self::On),
            4 => Some(Self::ResettingFaults),
            7 => Some(Self::FaultResetFailed),
            _ => None,
        }
    }

    /// Faulted covers both the plain fault and a failed reset.
    #[inline]
    pub const fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted | Self::FaultResetFailed)
    }
}

/// RF drive mode, both as commanded and as read back.
///
/// `Chirp` sweeps frequency to measure detune before resonance lock; the
/// SEL family is closed-loop amplitude/phase control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RfMode {
    Selap = 0,
    Sela = 1,
    Sel = 2,
    SelRaw = 3,
    Pulse = 4,
    Chirp = 5,
}

impl RfMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Selap),
            1 => Some(Self::Sela),
            2 => Some(Self::Sel),
            3 => Some(Self::SelRaw),
            4 => Some(Self::Pulse),
            5 => Some(Self::Chirp),
            _ => None,
        }
    }
}

/// Mechanical tune configuration of the cavity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TuneConfig {
    /// On electrical resonance.
    Resonance = 0,
    /// At the cold-landing position.
    Cold = 1,
    /// Parked off resonance.
    Parked = 2,
    /// In between, e.g. mid-move.
    Other = 3,
}

impl TuneConfig {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Resonance),
            1 => Some(Self::Cold),
            2 => Some(Self::Parked),
            3 => Some(Self::Other),
            _ => None,
        }
    }
}

/// Cavity hardware availability mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HwMode {
    Online = 0,
    Maintenance = 1,
    Offline = 2,
    MaintenanceDone = 3,
    Ready = 4,
}

impl HwMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Online),
            1 => Some(Self::Maintenance),
            2 => Some(Self::Offline),
            3 => Some(Self::MaintenanceDone),
            4 => Some(Self::Ready),
            _ => None,
        }
    }
}

/// Characterization / calibration run status published by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RunStatus {
    /// The run aborted inside the firmware.
    Crashed = 0,
    /// The run finished and results are available.
    Complete = 1,
    /// The run is still in progress.
    Running = 2,
}

impl RunStatus {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Crashed),
            1 => Some(Self::Complete),
            2 => Some(Self::Running),
            _ => None,
        }
    }
}

/// Piezo amplifier enable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PiezoEnable {
    Disabled = 0,
    Enabled = 1,
}

impl PiezoEnable {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Enabled),
            _ => None,
        }
    }
}

/// Piezo feedback mode: closed-loop or externally driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PiezoMode {
    Manual = 0,
    Feedback = 1,
}

impl PiezoMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Manual),
            1 => Some(Self::Feedback),
            _ => None,
        }
    }
}
