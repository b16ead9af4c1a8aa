//! Scriptable in-memory control system.
//!
//! Fills the pluggable-backend slot of [`crate::controls::ControlSystem`]
//! for tests and offline rigs: per-address read scripts with a sticky last
//! value, write echo (a write updates the value subsequent reads see), a
//! full write log, and per-address severity overrides. [`FakeClock`]
//! records every sleep and advances a virtual epoch so freshness windows
//! can be exercised without waiting.

use crate::controls::{Clock, ControlSystem, Reading, Value};
use srf_common::error::ControlError;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct PointState {
    /// Pending scripted readings, served in order before `current`.
    script: VecDeque<Reading>,
    /// Sticky value served once the script is exhausted.
    current: Option<Reading>,
}

/// In-memory [`ControlSystem`]. Addresses never need declaring up front;
/// an unknown address reads as `0.0` with no alarm.
#[derive(Default)]
pub struct SimControlSystem {
    points: Mutex<HashMap<String, PointState>>,
    writes: Mutex<Vec<(String, Value)>>,
    enums: Mutex<HashMap<String, BTreeMap<String, i32>>>,
}

impl SimControlSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sticky value an address reads as.
    pub fn set(&self, addr: &str, value: impl Into<Value>) {
        self.set_reading(addr, Reading::valid(value));
    }

    /// Set a sticky reading including severity.
    pub fn set_reading(&self, addr: &str, reading: Reading) {
        let mut points = self.points.lock().unwrap();
        points.entry(addr.to_string()).or_default().current = Some(reading);
    }

    /// Mark an address invalid until overwritten.
    pub fn set_invalid(&self, addr: &str, value: impl Into<Value>) {
        self.set_reading(addr, Reading::invalid(value));
    }

    /// Queue a sequence of readings; the last one becomes sticky.
    pub fn script(&self, addr: &str, readings: impl IntoIterator<Item = Reading>) {
        let mut points = self.points.lock().unwrap();
        let state = points.entry(addr.to_string()).or_default();
        for reading in readings {
            state.script.push_back(reading);
        }
    }

    /// Queue plain valid values; convenience over [`Self::script`].
    pub fn script_values(&self, addr: &str, values: impl IntoIterator<Item = f64>) {
        self.script(addr, values.into_iter().map(Reading::valid));
    }

    /// Publish an enum option map for an address.
    pub fn set_enum_options(&self, addr: &str, options: BTreeMap<String, i32>) {
        self.enums.lock().unwrap().insert(addr.to_string(), options);
    }

    /// Every write issued, in order.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap().clone()
    }

    /// Values written to one address, in order.
    pub fn writes_to(&self, addr: &str) -> Vec<Value> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == addr)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn write_count(&self, addr: &str) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == addr)
            .count()
    }
}

impl ControlSystem for SimControlSystem {
    fn read(&self, addr: &str) -> Result<Reading, ControlError> {
        let mut points = self.points.lock().unwrap();
        let state = points.entry(addr.to_string()).or_default();
        if let Some(front) = state.script.pop_front() {
            // Last scripted reading sticks once the queue drains.
            if state.script.is_empty() {
                state.current = Some(front.clone());
            }
            return Ok(front);
        }
        Ok(state
            .current
            .clone()
            .unwrap_or_else(|| Reading::valid(0.0)))
    }

    fn write(&self, addr: &str, value: Value) -> Result<(), ControlError> {
        self.writes
            .lock()
            .unwrap()
            .push((addr.to_string(), value.clone()));
        // Echo: readbacks follow the setpoint unless a script overrides.
        let mut points = self.points.lock().unwrap();
        points.entry(addr.to_string()).or_default().current = Some(Reading::valid(value));
        Ok(())
    }

    fn read_enum_options(&self, addr: &str) -> Result<BTreeMap<String, i32>, ControlError> {
        self.enums
            .lock()
            .unwrap()
            .get(addr)
            .cloned()
            .ok_or_else(|| ControlError::Unreachable(addr.to_string()))
    }
}

/// Virtual clock: sleeps advance the epoch instead of blocking.
#[derive(Default)]
pub struct FakeClock {
    now: Mutex<f64>,
    sleeps: Mutex<Vec<f64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(epoch_secs: f64) -> Self {
        Self {
            now: Mutex::new(epoch_secs),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn set_epoch(&self, epoch_secs: f64) {
        *self.now.lock().unwrap() = epoch_secs;
    }

    /// Every sleep requested so far, in seconds.
    pub fn sleeps(&self) -> Vec<f64> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        self.sleeps.lock().unwrap().push(secs);
        *self.now.lock().unwrap() += secs;
    }

    fn epoch_secs(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}
