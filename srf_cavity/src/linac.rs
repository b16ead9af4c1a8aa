//! Accelerator addressing hierarchy.
//!
//! Pure composition: `Machine` → `Linac` → `Cryomodule` → `Rack` →
//! [`Cavity`]. The whole tree is built eagerly at construction from the
//! fixed cryomodule tables; there is no dynamic add/remove and no global
//! registry. Every level knows only its address prefix — all control
//! logic lives in the cavity and its actuators.

use crate::cavity::{Cavity, CavityId};
use crate::controls::{Clock, ControlSystem};
use srf_common::config::TuningConfig;
use srf_common::consts::{HL_CRYOMODULES, LINAC_CRYOMODULES};
use std::sync::Arc;

/// Anything with a process-variable address prefix.
pub trait Addressable {
    fn pv_prefix(&self) -> String;
}

/// Compose a full address from a device prefix and a suffix.
pub fn pv_addr(device: &impl Addressable, suffix: &str) -> String {
    format!("{}{}", device.pv_prefix(), suffix)
}

impl Addressable for Cavity {
    fn pv_prefix(&self) -> String {
        self.id().prefix()
    }
}

/// Corrector/focusing magnet next to a cryomodule. Address-only; magnet
/// control is outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnetKind {
    Quadrupole,
    XCorrector,
    YCorrector,
}

impl MagnetKind {
    fn infix(&self) -> &'static str {
        match self {
            Self::Quadrupole => "QUAD",
            Self::XCorrector => "XCOR",
            Self::YCorrector => "YCOR",
        }
    }
}

pub struct Magnet {
    kind: MagnetKind,
    linac: String,
    cryomodule: String,
}

impl Magnet {
    pub fn kind(&self) -> MagnetKind {
        self.kind
    }
}

impl Addressable for Magnet {
    fn pv_prefix(&self) -> String {
        format!("{}:{}:{}85:", self.kind.infix(), self.linac, self.cryomodule)
    }
}

/// Half a cryomodule: rack A drives cavities 1-4, rack B cavities 5-8.
pub struct Rack {
    name: char,
    linac: String,
    cryomodule: String,
    cavities: Vec<Cavity>,
}

impl Rack {
    fn new(
        name: char,
        linac: &str,
        cryomodule: &str,
        numbers: std::ops::RangeInclusive<u8>,
        cs: &Arc<dyn ControlSystem>,
        clock: &Arc<dyn Clock>,
        config: &TuningConfig,
    ) -> Self {
        let cavities = numbers
            .map(|n| {
                Cavity::new(
                    CavityId::new(linac, cryomodule, n),
                    cs.clone(),
                    clock.clone(),
                    config.clone(),
                )
            })
            .collect();
        Self {
            name,
            linac: linac.to_string(),
            cryomodule: cryomodule.to_string(),
            cavities,
        }
    }

    pub fn name(&self) -> char {
        self.name
    }

    pub fn cavities(&self) -> &[Cavity] {
        &self.cavities
    }
}

impl Addressable for Rack {
    fn pv_prefix(&self) -> String {
        format!(
            "ACCL:{}:{}00:RACK{}:",
            self.linac, self.cryomodule, self.name
        )
    }
}

pub struct Cryomodule {
    name: String,
    linac: String,
    is_hl: bool,
    racks: [Rack; 2],
    magnets: Vec<Magnet>,
}

impl Cryomodule {
    fn new(
        name: &str,
        linac: &str,
        cs: &Arc<dyn ControlSystem>,
        clock: &Arc<dyn Clock>,
        config: &TuningConfig,
    ) -> Self {
        let is_hl = HL_CRYOMODULES.contains(&name);
        let racks = [
            Rack::new('A', linac, name, 1..=4, cs, clock, config),
            Rack::new('B', linac, name, 5..=8, cs, clock, config),
        ];
        // HL modules sit in a chicane with no magnet package.
        let magnets = if is_hl {
            Vec::new()
        } else {
            [
                MagnetKind::Quadrupole,
                MagnetKind::XCorrector,
                MagnetKind::YCorrector,
            ]
            .into_iter()
            .map(|kind| Magnet {
                kind,
                linac: linac.to_string(),
                cryomodule: name.to_string(),
            })
            .collect()
        };
        Self {
            name: name.to_string(),
            linac: linac.to_string(),
            is_hl,
            racks,
            magnets,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_hl(&self) -> bool {
        self.is_hl
    }

    pub fn racks(&self) -> &[Rack; 2] {
        &self.racks
    }

    pub fn magnets(&self) -> &[Magnet] {
        &self.magnets
    }

    pub fn cavities(&self) -> impl Iterator<Item = &Cavity> {
        self.racks.iter().flat_map(|r| r.cavities().iter())
    }

    pub fn cavity(&self, number: u8) -> Option<&Cavity> {
        self.cavities().find(|c| c.id().number == number)
    }
}

impl Addressable for Cryomodule {
    fn pv_prefix(&self) -> String {
        format!("ACCL:{}:{}00:", self.linac, self.name)
    }
}

pub struct Linac {
    name: String,
    cryomodules: Vec<Cryomodule>,
}

impl Linac {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cryomodules(&self) -> &[Cryomodule] {
        &self.cryomodules
    }
}

/// The full accelerator, built eagerly from the fixed cryomodule tables.
pub struct Machine {
    linacs: Vec<Linac>,
}

impl Machine {
    pub fn new(
        cs: Arc<dyn ControlSystem>,
        clock: Arc<dyn Clock>,
        config: TuningConfig,
    ) -> Self {
        let linacs = ["L0B", "L1B", "L2B", "L3B"]
            .into_iter()
            .zip(LINAC_CRYOMODULES)
            .map(|(name, cryomodules)| Linac {
                name: name.to_string(),
                cryomodules: cryomodules
                    .iter()
                    .map(|cm| Cryomodule::new(cm, name, &cs, &clock, &config))
                    .collect(),
            })
            .collect();
        Self { linacs }
    }

    pub fn linacs(&self) -> &[Linac] {
        &self.linacs
    }

    pub fn cryomodules(&self) -> impl Iterator<Item = &Cryomodule> {
        self.linacs.iter().flat_map(|l| l.cryomodules().iter())
    }

    pub fn cryomodule(&self, name: &str) -> Option<&Cryomodule> {
        self.cryomodules().find(|cm| cm.name() == name)
    }

    pub fn cavity(&self, cryomodule: &str, number: u8) -> Option<&Cavity> {
        self.cryomodule(cryomodule)?.cavity(number)
    }
}
