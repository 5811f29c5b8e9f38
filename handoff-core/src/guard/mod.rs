//! Guard trait for memory reclamation strategies.
//!
//! This module defines the `Guard` trait that abstracts over the memory
//! reclamation strategy a queue uses to retire links (epoch-based, deferred,
//! hazard pointers).
//!
//! # Design
//!
//! The `Guard` trait lets the queue be generic over its reclamation strategy:
//!
//! ```text
//! LockFreeQueue<T, G: Guard>
//!     │
//!     ├── LockFreeQueue<T, EpochGuard>      (production, handoff-crossbeam)
//!     └── LockFreeQueue<T, DeferredGuard>   (testing)
//! ```
//!
//! The queue uses a guard in two ways:
//!
//! - every operation pins a [`Guard::ReadGuard`] before it dereferences a link
//!   reached through `head` or `tail`, and loads those pointers through
//!   [`Guard::protect`];
//! - every link that leaves the queue (a retired dummy, a dequeued payload
//!   the caller is done with) is handed to [`Guard::defer`], never freed or
//!   reused directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use handoff_core::LockFreeQueue;
//! use handoff_crossbeam::EpochGuard;
//!
//! let queue: LockFreeQueue<Job, EpochGuard> = LockFreeQueue::new();
//! queue.enqueue(Box::new(Job::new(42)));
//! let job = queue.dequeue();
//! ```

mod deferred_guard;

use std::sync::atomic::{AtomicPtr, Ordering};

pub use deferred_guard::DeferredGuard;

/// A memory reclamation guard that protects concurrent access to links.
///
/// Different implementations provide different trade-offs:
///
/// - **EpochGuard**: Low overhead, batched reclamation (crossbeam-epoch)
/// - **DeferredGuard**: Simple, defers all callbacks until guard drops (testing)
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. Callbacks passed to `defer` do not run while any `ReadGuard` that was
///    pinned before the `defer` call is still alive
/// 2. A pointer returned by `protect` stays dereferenceable for as long as
///    the `ReadGuard` it was loaded under
///
/// # Design Note
///
/// Guards are stored in queues and must be `Send + Sync`. The stored guard
/// is used for deferred callbacks. Actual thread pinning happens
/// per-operation through `pin`, not when the guard is created.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards, this holds an actual pinned `crossbeam_epoch::Guard`.
    /// For deferred guards, this can be a unit type `()` since nothing is
    /// reclaimed before the stored guard says so.
    ///
    type ReadGuard: Sized;

    /// Pin an active read guard.
    ///
    /// Dropping the returned value releases the protection, which is the
    /// equivalent of clearing a hazard pointer slot.
    ///
    fn pin() -> Self::ReadGuard;

    /// Load a shared link pointer under `read`.
    ///
    /// The pointee will not be reclaimed by a deferred callback until `read`
    /// is dropped.
    ///
    #[inline]
    fn protect<N>(read: &Self::ReadGuard, src: &AtomicPtr<N>) -> *mut N {
        let _ = read;
        src.load(Ordering::Acquire)
    }

    /// Schedule `callback` to run once no thread can still hold a pointer it
    /// loaded before this call.
    ///
    /// May run `callback` synchronously when that is already safe.
    ///
    fn defer<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static;

    /// Hint that deferred callbacks are wanted soon.
    ///
    /// Called when the queue runs out of dummy links, which only come back
    /// through deferred callbacks.
    ///
    fn flush(&self) {}
}
