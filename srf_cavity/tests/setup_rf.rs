//! End-to-end commissioning sequence against the simulation backend.

use srf_cavity::cavity::{Cavity, CavityId};
use srf_cavity::controls::Value;
use srf_cavity::sim::{FakeClock, SimControlSystem};
use srf_common::config::TuningConfig;
use srf_common::error::Error;
use srf_common::state::{RunStatus, SsaStatus};
use std::sync::Arc;

fn rig() -> (Cavity, Arc<SimControlSystem>, Arc<FakeClock>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let sim = Arc::new(SimControlSystem::new());
    let clock = Arc::new(FakeClock::starting_at(1_000.0));
    let cavity = Cavity::new(
        CavityId::new("L0B", "01", 1),
        sim.clone(),
        clock.clone(),
        TuningConfig::default(),
    );
    (cavity, sim, clock)
}

#[test]
fn setup_rf_commissions_the_cavity() {
    let (cavity, sim, _clock) = rig();
    let p = "ACCL:L0B:0110:";

    sim.set(format!("{p}ADES_MAX").as_str(), 21.0);
    sim.set(format!("{p}RFPERMIT").as_str(), 1i64);
    sim.set(format!("{p}SSA:StatusMsg").as_str(), SsaStatus::On as i64);
    // Off when confirming the initial shutdown, on after the chirp-mode
    // turn-on.
    sim.script_values(format!("{p}RFSTATE").as_str(), [0.0, 1.0]);

    // SSA calibration results.
    sim.set(format!("{p}SSA:DRV_MAX_SAVE").as_str(), 0.7);
    sim.set(
        format!("{p}SSA:CALSTS").as_str(),
        RunStatus::Complete as i64,
    );
    sim.set(format!("{p}SSA:CALPWR").as_str(), 4000.0);
    sim.set(format!("{p}SSA:SLOPE_NEW").as_str(), 1.1);

    // Tuning: detune measured in chirp mode, 800 Hz then on tolerance.
    sim.set(format!("{p}RFMODE").as_str(), 5i64);
    sim.set(format!("{p}STEP:SCALE").as_str(), 0.1);
    sim.script_values(
        format!("{p}CHIRP:DF").as_str(),
        [800.0, 800.0, 800.0, 20.0, 20.0],
    );

    // Piezo reports enabled; feedback mode flips after one cycle.
    sim.set(format!("{p}PZT:ENABLESTAT").as_str(), 1i64);
    sim.script_values(format!("{p}PZT:MODESTAT").as_str(), [0.0, 0.0, 1.0]);

    // Characterization: previous result too old, new run completes.
    sim.set(format!("{p}PROBECALTS").as_str(), 800.0);
    sim.script_values(format!("{p}PROBECALSTS").as_str(), [2.0, 1.0, 1.0]);
    sim.set(format!("{p}QLOADED_NEW").as_str(), 4.0e7);
    sim.set(format!("{p}CAV:CAL_SCALEB_NEW").as_str(), 30.0);

    cavity.setup_rf(16.6).unwrap();

    // One calibration and one characterization run, results pushed.
    assert_eq!(sim.write_count(&format!("{p}SSA:CALSTRT")), 1);
    assert_eq!(sim.write_count(&format!("{p}PROBECALSTRT")), 1);
    assert_eq!(sim.write_count(&format!("{p}PUSH_SSA_SLOPE.PROC")), 1);
    assert_eq!(sim.write_count(&format!("{p}PUSH_QLOADED.PROC")), 1);
    assert_eq!(sim.write_count(&format!("{p}PUSH_CAV_SCALE.PROC")), 1);
    assert_eq!(sim.write_count(&format!("{p}QPROBE_CALC1.PROC")), 1);

    // Chirp for the detune search, then SEL and finally SELA.
    assert_eq!(
        sim.writes_to(&format!("{p}RFMODECTRL")),
        vec![Value::Int(5), Value::Int(2), Value::Int(1)]
    );

    // Tuner: mid-move config during the search, resonance at the end,
    // one damped 7200-step move.
    assert_eq!(
        sim.writes_to(&format!("{p}TUNE_CONFIG")),
        vec![Value::Int(3), Value::Int(0)]
    );
    assert_eq!(
        sim.writes_to(&format!("{p}STEP:NSTEPS")),
        vec![Value::Int(7200)]
    );

    // Amplitude never overshoots and lands exactly on target.
    let amp_writes = sim.writes_to(&format!("{p}ADES"));
    assert!(!amp_writes.is_empty());
    for write in &amp_writes {
        assert!(write.as_f64().unwrap() <= 16.6 + 1e-9);
    }
    assert_eq!(amp_writes.last().unwrap().as_f64().unwrap(), 16.6);

    sim.set(format!("{p}AACTMEAN").as_str(), 16.6);
    assert_eq!(cavity.core().measured_amplitude().unwrap(), 16.6);
}

#[test]
fn setup_rf_leaves_rf_off_when_calibration_fails() {
    let (cavity, sim, _clock) = rig();
    let p = "ACCL:L0B:0110:";

    sim.set(format!("{p}ADES_MAX").as_str(), 21.0);
    sim.set(format!("{p}RFPERMIT").as_str(), 1i64);
    sim.set(format!("{p}SSA:StatusMsg").as_str(), SsaStatus::On as i64);
    // CALSTS stays at 0: every calibration run reads back as crashed.

    let err = cavity.setup_rf(16.6).unwrap_err();
    assert!(matches!(err, Error::SsaCalibration(_)));
    // Initial attempt plus three retries before giving up.
    assert_eq!(sim.write_count(&format!("{p}SSA:CALSTRT")), 4);

    // Safe-state rule: the last RF command is "off".
    let rf_writes = sim.writes_to(&format!("{p}RFCTRL"));
    assert_eq!(rf_writes.last(), Some(&Value::Int(0)));
    // The ramp never started.
    assert!(sim.writes_to(&format!("{p}ADES")).is_empty());
}
