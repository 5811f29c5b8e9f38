// Intrusive link encoding.
//
// A link's `next` word is either a real `*mut Link` or one of four sentinel
// values. Sentinels are addresses 0..=3, none of which can be the address of
// a `Link` (null, or not 4-byte aligned):
//
//   0: FREE      - not in a queue, may be enqueued
//   1: POISONED  - not in a queue, must be unpoisoned before enqueue
//   2: END       - last link of a queue
//   3: INVALID   - just dequeued, tripwire for stale readers
//
// Legal transitions:
//
//   POISONED ──unpoison──► FREE ──enqueue──► END ──link──► next
//                           ▲                  │             │
//                           └──release── INVALID ◄──dequeue──┘
//
use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use thiserror::Error;

const FREE: *mut Link = ptr::null_mut();
const POISONED: *mut Link = ptr::without_provenance_mut(1);
const END: *mut Link = ptr::without_provenance_mut(2);
const INVALID: *mut Link = ptr::without_provenance_mut(3);

const LAST_SENTINEL: usize = 3;

// Sentinels must never collide with a real link address.
const _: () = assert!(mem::align_of::<Link>() > LAST_SENTINEL);

/// Decoded value of a link's `next` word.
///
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not linked into any queue, safe to enqueue.
    Free,
    /// Not linked, and not yet safe to enqueue.
    Poisoned,
    /// Last link of a queue.
    End,
    /// Dequeued. Must be released before it can be enqueued again.
    Invalid,
    /// Linked, followed by `next`.
    Linked(NonNull<Link>),
}

// The pointer in `Linked` is a snapshot for diagnostics, never dereferenced
// through the public API.
unsafe impl Send for LinkState {}
unsafe impl Sync for LinkState {}

impl LinkState {
    #[inline]
    fn decode(raw: *mut Link) -> Self {
        match raw.addr() {
            0 => LinkState::Free,
            1 => LinkState::Poisoned,
            2 => LinkState::End,
            3 => LinkState::Invalid,
            // SAFETY: every address above the sentinels is non-null
            _ => LinkState::Linked(unsafe { NonNull::new_unchecked(raw) }),
        }
    }
}

impl fmt::Debug for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Free => f.write_str("Free"),
            LinkState::Poisoned => f.write_str("Poisoned"),
            LinkState::End => f.write_str("End"),
            LinkState::Invalid => f.write_str("Invalid"),
            LinkState::Linked(next) => write!(f, "Linked({:p})", next.as_ptr()),
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Free => f.write_str("free"),
            LinkState::Poisoned => f.write_str("poisoned"),
            LinkState::End => f.write_str("the queue end"),
            LinkState::Invalid => f.write_str("invalid"),
            LinkState::Linked(next) => write!(f, "linked to {:p}", next.as_ptr()),
        }
    }
}

/// A caller attempted a link transition from the wrong state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkStateError {
    #[error("link is {found}, expected free")]
    NotFree { found: LinkState },

    #[error("link is {found}, expected poisoned")]
    NotPoisoned { found: LinkState },

    #[error("link is {found}, expected invalid")]
    NotInvalid { found: LinkState },
}

/// The intrusive link a queue element embeds.
///
/// A `Link` must not move while it is linked into a queue; the [`Linked`]
/// implementation of the containing type is responsible for that.
///
/// [`Linked`]: super::Linked
///
pub struct Link {
    next: AtomicPtr<Link>,
}

impl Link {
    /// A free link, ready to be enqueued.
    pub const fn new() -> Self {
        Link {
            next: AtomicPtr::new(FREE),
        }
    }

    /// A poisoned link. It has to be [`unpoison`](Link::unpoison)ed before
    /// it can be enqueued.
    pub const fn poisoned() -> Self {
        Link {
            next: AtomicPtr::new(POISONED),
        }
    }

    /// Reset the link to poisoned or free.
    ///
    /// Only for links the caller exclusively owns (never enqueued, or
    /// dequeued and released).
    ///
    pub fn init(&self, poisoned: bool) {
        let state = if poisoned { POISONED } else { FREE };
        self.next.store(state, Ordering::Release);
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        LinkState::decode(self.next.load(Ordering::Acquire))
    }

    pub fn is_free(&self) -> bool {
        self.next.load(Ordering::Acquire) == FREE
    }

    /// Poisoned → Free.
    ///
    /// # Panics
    ///
    /// If the link is not poisoned.
    ///
    pub fn unpoison(&self) {
        if let Err(error) = self.try_unpoison() {
            panic!("unpoison: {error}");
        }
    }

    /// Poisoned → Free, reporting the observed state on failure.
    pub fn try_unpoison(&self) -> Result<(), LinkStateError> {
        self.transition(POISONED, FREE)
            .map_err(|found| LinkStateError::NotPoisoned { found })
    }

    /// Invalid → Free, making a dequeued link enqueueable again.
    ///
    /// # Panics
    ///
    /// If the link is not invalid.
    ///
    pub fn release(&self) {
        if let Err(error) = self.try_release() {
            panic!("release: {error}");
        }
    }

    /// Invalid → Free, reporting the observed state on failure.
    pub fn try_release(&self) -> Result<(), LinkStateError> {
        self.transition(INVALID, FREE)
            .map_err(|found| LinkStateError::NotInvalid { found })
    }

    // =========================================================================
    // Queue protocol accessors
    // =========================================================================

    /// Free → End. Panics on any other state: enqueueing a link that is
    /// poisoned or already linked corrupts the queue.
    #[inline]
    pub(crate) fn begin_enqueue(&self) {
        if let Err(found) = self.transition(FREE, END) {
            panic!("enqueue: {}", LinkStateError::NotFree { found });
        }
    }

    /// Load the raw next word (Acquire ordering).
    #[inline]
    pub(crate) fn load_next(&self) -> *mut Link {
        self.next.load(Ordering::Acquire)
    }

    /// CAS End → `node` (Release/Relaxed ordering).
    ///
    /// Release publishes everything written to `node` before the enqueue.
    #[inline]
    pub(crate) fn try_append(&self, node: *mut Link) -> bool {
        self.next
            .compare_exchange(END, node, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    /// Mark a link that was just detached from a queue.
    #[inline]
    pub(crate) fn invalidate(&self) {
        self.next.store(INVALID, Ordering::Release);
    }

    #[inline]
    fn transition(&self, from: *mut Link, to: *mut Link) -> Result<(), LinkState> {
        self.next
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LinkState::decode)
    }
}

/// True when `next` is the end-of-queue sentinel.
#[inline]
pub(crate) fn is_end(next: *mut Link) -> bool {
    next == END
}

/// True when `next` points at another link rather than holding a sentinel.
#[inline]
pub(crate) fn is_successor(next: *mut Link) -> bool {
    next.addr() > LAST_SENTINEL
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("next", &self.state()).finish()
    }
}
