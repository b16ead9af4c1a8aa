//! Cooperative cancellation flag.
//!
//! One flag per cavity, cloned into every controller that can block. An
//! external actor (operator display, watchdog) requests the abort; every
//! polling loop checks the flag each iteration via its owner's
//! `check_abort` and unwinds with [`Error::Aborted`](crate::error::Error).
//! The observation is edge-triggered: `take` clears the flag so the next
//! operation starts clean.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared abort request flag. Cheap to clone; all clones observe the
/// same request.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag {
    requested: Arc<AtomicBool>,
}

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the in-flight operation.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Non-consuming check, for callers that only want to observe.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Consume a pending request. Returns true at most once per request.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}
