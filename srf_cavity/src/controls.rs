//! Control-point access layer.
//!
//! The crate never owns the transport; it talks to remote process
//! variables through [`ControlSystem`], implemented by the site gateway in
//! production and by [`crate::sim::SimControlSystem`] in tests. Each
//! controller composes its addresses once at construction and holds a
//! [`ControlPoint`] handle per variable — no global registries, no lazy
//! lookup state.

use srf_common::error::{ControlError, Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// EPICS-style alarm severity attached to every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    NoAlarm,
    Minor,
    Major,
    /// The value is not usable (disconnected, stale, out of range).
    Invalid,
}

/// Scalar value carried by a control point.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    Str(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Str(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Float(v) => Some(*v as i64),
            Value::Int(v) => Some(*v),
            Value::Str(_) => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

/// One read result: value plus validity.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: Value,
    pub severity: Severity,
}

impl Reading {
    pub fn valid(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            severity: Severity::NoAlarm,
        }
    }

    pub fn invalid(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            severity: Severity::Invalid,
        }
    }
}

/// Remote variable access. Implementations must be safe to share across
/// cavities; all site state lives behind the trait.
pub trait ControlSystem: Send + Sync {
    fn read(&self, addr: &str) -> std::result::Result<Reading, ControlError>;

    fn write(&self, addr: &str, value: Value) -> std::result::Result<(), ControlError>;

    /// Enumerated variables publish their name → code map.
    fn read_enum_options(
        &self,
        addr: &str,
    ) -> std::result::Result<BTreeMap<String, i32>, ControlError>;
}

/// Handle to one remote variable: a composed address plus the shared
/// transport. Owned by exactly one controller; never shared for mutation.
#[derive(Clone)]
pub struct ControlPoint {
    addr: String,
    cs: Arc<dyn ControlSystem>,
}

impl fmt::Debug for ControlPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPoint")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl ControlPoint {
    pub fn new(addr: impl Into<String>, cs: Arc<dyn ControlSystem>) -> Self {
        Self {
            addr: addr.into(),
            cs,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn read(&self) -> Result<Reading> {
        Ok(self.cs.read(&self.addr)?)
    }

    /// Numeric readback, ignoring severity.
    pub fn get_f64(&self) -> Result<f64> {
        let reading = self.read()?;
        reading
            .value
            .as_f64()
            .ok_or_else(|| Error::ControlPoint(ControlError::BadValue(self.addr.clone())))
    }

    pub fn get_i64(&self) -> Result<i64> {
        let reading = self.read()?;
        reading
            .value
            .as_i64()
            .ok_or_else(|| Error::ControlPoint(ControlError::BadValue(self.addr.clone())))
    }

    /// Readback severity only.
    pub fn severity(&self) -> Result<Severity> {
        Ok(self.read()?.severity)
    }

    pub fn put(&self, value: impl Into<Value>) -> Result<()> {
        Ok(self.cs.write(&self.addr, value.into())?)
    }

    pub fn enum_options(&self) -> Result<BTreeMap<String, i32>> {
        Ok(self.cs.read_enum_options(&self.addr)?)
    }
}

/// Time source for the blocking/polling model. Injected so tests can run
/// the multi-second commissioning sequences instantly.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);

    /// Seconds since the Unix epoch, used for result freshness checks.
    fn epoch_secs(&self) -> f64;

    fn sleep_secs(&self, secs: f64) {
        if secs > 0.0 {
            self.sleep(Duration::from_secs_f64(secs));
        }
    }
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn epoch_secs(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_conversions() {
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(2.9).as_i64(), Some(2));
        assert_eq!(Value::Str("x".into()).as_f64(), None);
        assert_eq!(Value::Str("x".into()).as_i64(), None);
    }

    #[test]
    fn reading_constructors() {
        assert_eq!(Reading::valid(1.0).severity, Severity::NoAlarm);
        assert_eq!(Reading::invalid(0.0).severity, Severity::Invalid);
    }

    #[test]
    fn system_clock_epoch_is_sane() {
        // Sometime after 2020.
        assert!(SystemClock.epoch_secs() > 1.58e9);
    }
}
