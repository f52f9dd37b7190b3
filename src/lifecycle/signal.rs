//! One-shot blocking signal

use std::sync::{Condvar, Mutex, PoisonError};

use tracing::debug;

/// Latch that blocks waiters until triggered
pub struct Signal {
    fired: Mutex<bool>,
    cvar: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            fired: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    /// Release every current and future waiter
    pub fn trigger(&self) {
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        if !*fired {
            debug!("signal triggered");
        }
        *fired = true;
        self.cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.fired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until triggered
    pub fn wait(&self) {
        let fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        let _fired = self
            .cvar
            .wait_while(fired, |fired| !*fired)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
