//! Stopping a running bulk fetch
//!
//! A [`CancelFlag`] is checked before each request, and the pauses between
//! requests or retries wake up as soon as it is raised.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The state shared by all clones of a flag.
#[derive(Debug, Default)]
struct Shared {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
}

/// A flag to ask a running bulk fetch to stop.
///
/// Clones share the same flag, so it can be handed to another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<Shared>);

impl CancelFlag {
    /// Creates a new flag, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        // A bool can't be left half-written, a poisoned lock is still usable
        self.0
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks the fetch to stop before its next request.
    pub fn cancel(&self) {
        *self.lock() = true;
        self.0.wakeup.notify_all();
    }

    /// Whether a cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    /// Sleeps for the given duration, or less if the flag is raised.
    /// Returns true if the flag is raised.
    pub fn wait(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return self.is_cancelled();
        }
        let guard = self.lock();
        let (guard, _timeout) = self
            .0
            .wakeup
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
