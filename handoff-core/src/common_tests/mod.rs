//! Reusable test suites for `LockFreeQueue`, generic over the guard.
//!
//! - [`queue_core_tests`] - single-threaded and phased concurrent behavior,
//!   valid for every guard
//! - [`queue_stress_tests`] - fully concurrent producers and consumers,
//!   needs a guard that reclaims while the queue is in use
//!
//! Both work on [`Job`], a small `#[repr(C)]` element type.


use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::guard::{DeferredGuard, Guard};
use crate::queue::{Dequeued, Link, Linked, LockFreeQueue};

/// Marker written into every `Job` at construction. A dequeued element
/// without it is not a `Job` (e.g. a dummy leaked out of the queue).
pub const JOB_TAG: u64 = 0x6a6f_625f_7461_6721;

/// Upper bound on attempts when a test waits for a dequeue or a reclamation.
pub const MAX_ATTEMPTS: usize = 1_000_000;

/// Queue element used by the test suites.
#[repr(C)]
#[derive(Debug)]
pub struct Job {
    link: Link,
    pub tag: u64,
    pub producer: usize,
    pub seq: usize,
    drops: Option<Arc<AtomicUsize>>,
}

impl Job {
    pub fn new(producer: usize, seq: usize) -> Self {
        Job {
            link: Link::new(),
            tag: JOB_TAG,
            producer,
            seq,
            drops: None,
        }
    }

    pub fn boxed(producer: usize, seq: usize) -> Box<Self> {
        Box::new(Self::new(producer, seq))
    }

    /// A job with a poisoned link.
    pub fn poisoned(producer: usize, seq: usize) -> Box<Self> {
        let job = Self::boxed(producer, seq);
        job.link.init(true);
        job
    }

    /// A job that bumps `drops` when dropped.
    pub fn tracked(producer: usize, seq: usize, drops: Arc<AtomicUsize>) -> Box<Self> {
        let mut job = Self::boxed(producer, seq);
        job.drops = Some(drops);
        job
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn is_job(&self) -> bool {
        self.tag == JOB_TAG
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::Relaxed);
        }
        self.tag = 0;
    }
}

unsafe impl Linked for Job {
    type Handle = Box<Job>;

    fn into_ptr(handle: Box<Job>) -> NonNull<Job> {
        NonNull::from(Box::leak(handle))
    }

    unsafe fn from_ptr(ptr: NonNull<Job>) -> Box<Job> {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Job>) -> NonNull<Link> {
        // `link` is the first field of a #[repr(C)] struct.
        ptr.cast()
    }

    unsafe fn from_links(links: NonNull<Link>) -> NonNull<Job> {
        links.cast()
    }
}

/// A guard whose deferred callbacks a test can force through.
pub trait Quiesce: Guard {
    /// Run, or push as far as possible towards running, pending deferred
    /// callbacks.
    ///
    /// # Safety
    ///
    /// No other thread may be using a queue that uses this guard.
    unsafe fn quiesce(&self);
}

impl Quiesce for DeferredGuard {
    unsafe fn quiesce(&self) {
        unsafe { self.reclaim() };
    }
}

/// Dequeue, forcing reclamation between attempts, until an element shows up.
///
/// Only for single-threaded use of `queue`.
pub fn dequeue_with_retry<G: Quiesce>(queue: &LockFreeQueue<Job, G>) -> Dequeued<'_, Job, G> {
    for _ in 0..MAX_ATTEMPTS {
        if let Some(job) = queue.dequeue() {
            return job;
        }

        // SAFETY: callers use the queue from this thread only.
        unsafe { queue.guard().quiesce() };
    }

    panic!("no element after {MAX_ATTEMPTS} dequeue attempts");
}
