//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! `EpochGuard` is a zero-sized type. Deferred callbacks go to the global
//! epoch collector and run once every thread that was pinned when they were
//! scheduled has moved on:
//!
//! ```text
//! LockFreeQueue<Job, EpochGuard>
//!     │
//!     ├── dequeue: pins the thread while it reads the head
//!     └── retired dummies, dequeued elements: crossbeam-epoch defers
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use handoff_core::LockFreeQueue;
//! use handoff_crossbeam::EpochGuard;
//!
//! let queue: LockFreeQueue<Job, EpochGuard> = LockFreeQueue::new();
//!
//! queue.enqueue(job);
//!
//! if let Some(job) = queue.dequeue() {
//!     println!("got {}", job.seq);
//! }
//! ```

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use handoff_core::common_tests::Quiesce;
use handoff_core::guard::Guard;

/// Epoch-based memory reclamation guard.
///
/// Unlike `DeferredGuard`, which keeps callbacks until it is dropped,
/// `EpochGuard` hands them to the global collector right away, so a queue
/// using it recycles its dummies while it is in use. That makes it the
/// guard for queues shared by producers and consumers for a long time.
///
/// Every `defer` also flushes the thread-local bag. A queue retires at
/// most two dummies before it needs one back, and crossbeam-epoch would
/// otherwise sit on them until the bag fills up.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct EpochGuard {
    // Zero-sized - all state is in the global epoch collector
}

impl EpochGuard {
    /// Create a new epoch guard.
    pub fn new() -> Self {
        EpochGuard {}
    }

    /// Push the global epoch forward until callbacks deferred so far had
    /// their chance to run.
    ///
    /// Callbacks still blocked by a thread that stays pinned are left for a
    /// later collection.
    ///
    pub fn collect(&self) {
        // Each flush may advance the global epoch by one step, and a bag is
        // collected two steps after it was sealed.
        for _ in 0..64 {
            epoch::pin().flush();
        }
    }
}

impl Guard for EpochGuard {
    /// An actual crossbeam epoch guard that pins the current thread for the
    /// duration of reads.
    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    fn defer<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = epoch::pin();
        guard.defer(callback);
        guard.flush();
        // guard dropped here - unpins the thread
    }

    fn flush(&self) {
        epoch::pin().flush();
    }
}

// Lets the shared queue suites run against this guard.
impl Quiesce for EpochGuard {
    unsafe fn quiesce(&self) {
        self.collect();
    }
}
