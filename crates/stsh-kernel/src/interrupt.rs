//! Interruptible sleeping.
//!
//! Periodic sources such as `now` wait between elements on a condition
//! variable. A signal handler (on another thread) triggers the interrupt,
//! which wakes every waiter and makes later waits return immediately until
//! the flag is reset.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

#[derive(Debug, Default)]
struct State {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Shared cancel flag plus condition variable. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    state: Arc<State>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop all current and future waits until [`reset`](Self::reset).
    pub fn trigger(&self) {
        let mut stopped = self.state.stopped.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        self.state.wake.notify_all();
    }

    pub fn reset(&self) {
        *self.state.stopped.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }

    pub fn is_triggered(&self) -> bool {
        *self.state.stopped.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep until `deadline`. Returns false if interrupted first.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.state.stopped.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *stopped {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            stopped = match self.state.wake.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}
