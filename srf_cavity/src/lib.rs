//! SRF cavity commissioning and resonance control.
//!
//! Drives superconducting RF cavities to a target resonance and amplitude
//! by coordinating three subordinate actuators over a remote control-point
//! interface: the RF power amplifier ([`ssa::Ssa`]), the slow mechanical
//! tuner ([`stepper::StepperTuner`]) and the fast piezoelectric tuner
//! ([`piezo::Piezo`]). The [`cavity::Cavity`] orchestrator sequences
//! characterization, resonance auto-tuning and amplitude ramp-up, with
//! cooperative abort propagated into every polling loop.
//!
//! # Module Structure
//!
//! - [`controls`] - Control-point access trait, value/severity model, clock
//! - [`sim`] - Scriptable in-memory control system for tests and bench rigs
//! - [`tolerance`] - Step-budget overshoot tolerance model
//! - [`ssa`] - RF amplifier power/reset/calibration controller
//! - [`stepper`] - Mechanical tuner move controller
//! - [`piezo`] - Fast tuner enable/feedback controller
//! - [`cavity`] - Per-cavity orchestrator
//! - [`linac`] - Eager machine/linac/cryomodule/rack composition
//!
//! Control flow is strictly one-directional: the orchestrator drives the
//! actuators and polls their readbacks. One cavity is driven by at most
//! one operation at a time; separate cavities are independent.

pub mod cavity;
pub mod controls;
pub mod linac;
pub mod piezo;
pub mod sim;
pub mod ssa;
pub mod stepper;
pub mod tolerance;
