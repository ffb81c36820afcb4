//! Bounded-wait registry lock
//!
//! Registry operations run from caller threads, the event-delivery context,
//! and repeat-timer tasks. All of them go through [`TimedLock`]: a mutex
//! acquired with a fixed timeout. An operation that cannot take the lock in
//! time proceeds without it instead of deadlocking the event-delivery
//! thread. Liveness is preferred over strict mutual exclusion here, and
//! callers accept the resulting race window.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

/// Default bound on lock acquisition.
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// A mutex whose `with` either holds the lock or, after the bounded wait,
/// runs the closure unsynchronized.
pub(crate) struct TimedLock<T> {
    inner: Mutex<T>,
    timeout: Duration,
}

impl<T> TimedLock<T> {
    pub fn new(value: T) -> Self {
        Self::with_timeout(value, LOCK_TIMEOUT)
    }

    pub fn with_timeout(value: T, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(value),
            timeout,
        }
    }

    /// Run `f` with exclusive access when the lock arrives within the bound,
    /// and with unsynchronized access otherwise.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        if let Some(mut guard) = self.inner.try_lock_for(self.timeout) {
            return f(&mut guard);
        }

        warn!(
            timeout_ms = self.timeout.as_millis() as u64,
            "lock wait exceeded bound, proceeding unsynchronized"
        );
        // SAFETY: knowingly unsound under contention. The holder exceeding
        // the bound is assumed wedged or long-running; mutating past it
        // keeps hotkey delivery alive. Callers never hold references into
        // the protected data across calls.
        unsafe { f(&mut *self.inner.data_ptr()) }
    }
}
