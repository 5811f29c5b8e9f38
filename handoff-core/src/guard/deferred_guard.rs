//! Deferred guard implementation for testing.
//!
//! This module provides `DeferredGuard`, a simple guard implementation that
//! defers every retired callback until the guard is dropped or explicitly
//! reclaimed.

use std::mem;
use std::sync::Mutex;

use super::Guard;

type DeferredCallback = Box<dyn FnOnce() + Send>;

/// A simple guard that defers all callbacks until the guard is dropped.
///
/// This is useful for testing where you want predictable reclamation timing.
/// Not suitable for production use: a queue retires a dummy link every time
/// it drains, and those dummies only come back when the callbacks run, so a
/// long-running queue on this guard ends up reporting a lone item as empty
/// until [`DeferredGuard::reclaim`] is called.
///
/// # Thread Safety
///
/// `DeferredGuard` uses a `Mutex` internally to safely collect callbacks from
/// multiple threads. The callbacks run when the guard is dropped.
///
pub struct DeferredGuard {
    deferred: Mutex<Vec<DeferredCallback>>,
}

impl DeferredGuard {
    /// Create a new deferred guard.
    pub fn new() -> Self {
        DeferredGuard {
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.deferred.lock().unwrap().len()
    }

    /// Run every deferred callback now.
    ///
    /// # Safety
    ///
    /// No other thread may be inside an operation on a structure that uses
    /// this guard, since `pin` gives no protection of its own.
    ///
    pub unsafe fn reclaim(&self) {
        let callbacks = mem::take(&mut *self.deferred.lock().unwrap());

        // Run outside the lock, a callback may defer again.
        //
        for callback in callbacks {
            callback();
        }
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let callbacks = mem::take(self.deferred.get_mut().unwrap());

        for callback in callbacks {
            callback();
        }
    }
}

impl Guard for DeferredGuard {
    /// For DeferredGuard, ReadGuard is a no-op since nothing is reclaimed
    /// until the stored guard drops.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {
        // No-op for DeferredGuard - protection is provided by the stored guard
    }

    fn defer<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.deferred.lock().unwrap().push(Box::new(callback));
    }
}
