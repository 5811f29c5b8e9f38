use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Link, LinkState};

/// Number of dummy links a queue owns. One is queued at construction, the
/// other covers the window in which a retired dummy waits for reclamation.
pub const DUMMY_COUNT: usize = 2;

/// A placeholder link owned by the queue.
///
struct DummySlot {
    link: Link,
    in_use: AtomicBool,
}

/// Fixed set of dummy links, addressed by index.
///
/// Shared through an `Arc` between the queue and every pending deferred
/// free, so a free that runs after the queue is gone still has a slot to
/// clear.
///
pub(crate) struct DummyPool {
    slots: [DummySlot; DUMMY_COUNT],
}

impl DummyPool {
    /// A pool whose first slot is in use and already marked as the queue
    /// end; the others are free.
    pub(crate) fn new() -> Self {
        DummyPool {
            slots: std::array::from_fn(|index| {
                let link = Link::new();
                if index == 0 {
                    link.begin_enqueue();
                }
                DummySlot {
                    link,
                    in_use: AtomicBool::new(index == 0),
                }
            }),
        }
    }

    /// Claim a slot that is not in use.
    ///
    /// Returns `None` when every slot is either queued or waiting for its
    /// deferred free to run.
    ///
    pub(crate) fn acquire(&self) -> Option<usize> {
        self.slots.iter().position(|slot| {
            !slot.in_use.load(Ordering::Relaxed)
                && slot
                    .in_use
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
        })
    }

    /// Give back a slot that was acquired but never enqueued.
    pub(crate) fn give_back(&self, index: usize) {
        let slot = &self.slots[index];
        debug_assert!(slot.link.is_free());
        slot.in_use.store(false, Ordering::Release);
    }

    /// Return a retired slot to the pool. Runs as a deferred callback, once
    /// no thread can still be reading the slot's link.
    pub(crate) fn free(&self, index: usize) {
        let slot = &self.slots[index];
        assert!(
            slot.in_use.load(Ordering::Relaxed),
            "dummy {index} freed while not in use"
        );

        slot.link.release();
        slot.in_use.store(false, Ordering::Release);
    }

    /// The link of slot `index`.
    pub(crate) fn link(&self, index: usize) -> NonNull<Link> {
        NonNull::from(&self.slots[index].link)
    }

    /// Index of the slot whose link is `link`, if `link` is a dummy.
    ///
    /// Compares addresses only, `link` is never dereferenced.
    ///
    pub(crate) fn index_of(&self, link: *const Link) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| ptr::eq(&slot.link, link))
    }

    pub(crate) fn contains(&self, link: *const Link) -> bool {
        self.index_of(link).is_some()
    }

    pub(crate) fn in_use(&self) -> [bool; DUMMY_COUNT] {
        std::array::from_fn(|index| self.slots[index].in_use.load(Ordering::Acquire))
    }

    pub(crate) fn link_states(&self) -> [LinkState; DUMMY_COUNT] {
        std::array::from_fn(|index| self.slots[index].link.state())
    }
}
