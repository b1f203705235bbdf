//! Mutex-guarded boolean used as the single-flight session guard.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A boolean whose load, store and compare-and-swap are mutually exclusive.
///
/// Waiters can block until the value changes; every `store` and successful
/// CAS wakes them.
#[derive(Debug, Default)]
pub struct AtomicFlag {
    value: Mutex<bool>,
    changed: Condvar,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: Mutex::new(value),
            changed: Condvar::new(),
        }
    }

    pub fn load(&self) -> bool {
        *self.lock()
    }

    pub fn store(&self, value: bool) {
        let mut guard = self.lock();
        *guard = value;
        self.changed.notify_all();
    }

    /// Set to `desired` if currently `expected`.
    ///
    /// Returns `(swapped, observed)` where `observed` is the value found
    /// before the operation.
    pub fn compare_and_swap(&self, expected: bool, desired: bool) -> (bool, bool) {
        let mut guard = self.lock();
        let observed = *guard;
        if observed == expected {
            *guard = desired;
            self.changed.notify_all();
            (true, observed)
        } else {
            (false, observed)
        }
    }

    /// Block the calling thread while the flag equals `value`.
    pub fn wait_while(&self, value: bool) {
        let guard = self.lock();
        let _guard = self
            .changed
            .wait_while(guard, |v| *v == value)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`wait_while`](Self::wait_while) with an upper bound.
    /// Returns `true` if the flag changed before the timeout.
    pub fn wait_while_timeout(&self, value: bool, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |v| *v == value)
            .unwrap_or_else(PoisonError::into_inner);
        *guard != value
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
