use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use super::dummy_pool::DummyPool;
use super::link::{self, Link};
use super::{Dequeued, Linked, QueueSnapshot};
use crate::guard::Guard;
use crate::trace::{debug, trace};

///
/// Intrusive multi-producer/multi-consumer queue based on Michael and Scott's
/// 'Simple, Fast, and Practical Non-Blocking and Blocking Concurrent Queue
/// Algorithms', modified so that `head` is the first element rather than a
/// sentinel in front of it.
///
// =============================================================================
// QUEUE STRUCTURE
// =============================================================================
//
// ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
// │  A   │───►│  B   │───►│  D1  │───►│  C   │───► END
// └──────┘    └──────┘    └──────┘    └──────┘
//    ▲                      (dummy)      ▲
//   head                                tail
//
// A dequeue detaches `head` itself by swinging head to head.next. That only
// works while head != tail, so a queue holding a single element C cannot hand
// C out:
//
//   head ──► C ───► END ◄── tail
//
// The fix is a dummy link appended behind C, after which C is detachable:
//
//   head ──► C ───► D ───► END
//                   ▲
//                  tail
//
// Dummies come from a fixed pool owned by the queue. A dummy that reaches the
// head is detached like any element, retired through the guard and replaced,
// but never returned to the caller.
//
// INVARIANTS:
// 1. head and tail are never null
// 2. tail is never behind head
// 3. At most one dummy is logically in the queue (has_dummy)
// 4. A detached link is never linked again until the guard has run its
//    deferred callback, which rules out ABA on head and tail
//
// =============================================================================
// ENQUEUE (link, then swing tail)
// =============================================================================
//
// Step 1 - CAS tail.next from END to node (linearization point):
//          tail ──► X ───► node ───► END
//
// Step 2 - CAS tail from X to node. May fail if another thread helped, which
//          is harmless.
//
// When tail.next is not END, tail is lagging behind a link another thread
// appended. Help by swinging tail forward, then retry.
//
// =============================================================================
// DEQUEUE
// =============================================================================
//
// head == tail, next == END:  empty. Re-insert a dummy (unless head already is
//                             one) and retry, or report empty.
// head == tail, next != END:  tail is lagging, swing it and retry.
// head != tail:               CAS head from head to next. The winner owns the
//                             detached link.
//
// A detached dummy restarts the whole operation after it has been retired
// and a replacement re-inserted.
//
// =============================================================================
//
pub struct LockFreeQueue<T: Linked, G: Guard> {
    head: AtomicPtr<Link>,
    tail: AtomicPtr<Link>,
    has_dummy: AtomicBool,
    pool: Arc<DummyPool>,
    /// Shared guard instance for deferred callbacks.
    guard: G,
    _handles: PhantomData<T::Handle>,
}

// Elements move between threads as handles, the queue itself only holds
// atomics and the pool.
unsafe impl<T, G> Sync for LockFreeQueue<T, G>
where
    T: Linked,
    T::Handle: Send,
    G: Guard,
{
}

impl<T, G> LockFreeQueue<T, G>
where
    T: Linked,
    T::Handle: Send + 'static,
    G: Guard,
{
    /// Create an empty queue. Its first dummy is already linked as both head
    /// and tail.
    pub fn new() -> Self {
        let pool = Arc::new(DummyPool::new());
        let first = pool.link(0).as_ptr();

        debug!("queue created");

        LockFreeQueue {
            head: AtomicPtr::new(first),
            tail: AtomicPtr::new(first),
            has_dummy: AtomicBool::new(true),
            pool,
            guard: G::default(),
            _handles: PhantomData,
        }
    }

    /// Get the shared guard instance for this queue.
    pub fn guard(&self) -> &G {
        &self.guard
    }

    /// Append an element at the tail.
    ///
    /// The element is visible to concurrent dequeuers before this returns,
    /// and everything written to it beforehand is visible to whichever
    /// thread dequeues it.
    ///
    /// # Panics
    ///
    /// If the element's link is not free (poisoned, or still linked). The
    /// handle is leaked in that case, since the element may be reachable
    /// from a queue.
    ///
    pub fn enqueue(&self, handle: T::Handle) {
        let element = T::into_ptr(handle);

        // SAFETY: `element` is live and owned by the queue from here on.
        unsafe { self.enqueue_link(T::links(element)) };
    }

    /// Remove the element at the head.
    ///
    /// Returns `None` when the queue is empty. It also returns `None` in the
    /// rare window where the queue holds a single element and every dummy is
    /// still waiting for reclamation; a later call picks the element up.
    ///
    pub fn dequeue(&self) -> Option<Dequeued<'_, T, G>> {
        'retry: loop {
            #[cfg(test)]
            attempts::record();

            let head = {
                let read = G::pin();

                loop {
                    let head = G::protect(&read, &self.head);
                    let tail = self.tail.load(Ordering::Acquire);

                    // SAFETY: head is never null, and `read` keeps it allocated.
                    let next = unsafe { (*head).load_next() };

                    // Are head, tail and next consistent?
                    if head != self.head.load(Ordering::Acquire) {
                        continue;
                    }

                    debug_assert!(next != head);

                    if head == tail {
                        if link::is_end(next) {
                            // Queue is empty.
                            drop(read);

                            // Only retry when this thread re-inserted the dummy
                            // itself, so the same dummy is not chased twice.
                            if !self.pool.contains(head) && self.try_reinsert_dummy() {
                                continue 'retry;
                            }

                            return None;
                        }

                        // Tail is lagging, help advance it.
                        let _ = self.tail.compare_exchange(
                            tail,
                            next,
                            Ordering::AcqRel,
                            Ordering::Relaxed,
                        );
                    } else {
                        debug_assert!(
                            link::is_successor(next),
                            "head {head:p} has no successor while tail is ahead"
                        );

                        if self
                            .head
                            .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed)
                            .is_ok()
                        {
                            break head;
                        }
                    }
                }
            };

            // Head is detached. No other thread can detach it again, so
            // handing it off is this thread's job alone.
            //
            // SAFETY: a detached link stays allocated until we pass it to
            // the guard or the caller.
            unsafe { (*head).invalidate() };

            if let Some(index) = self.pool.index_of(head) {
                let had_dummy = self.has_dummy.swap(false, Ordering::AcqRel);
                debug_assert!(had_dummy, "dequeued dummy {index} while none was queued");

                self.retire_dummy(index);
                self.try_reinsert_dummy();
                continue 'retry;
            }

            // SAFETY: every non-dummy link in the queue came from `enqueue`.
            let element = unsafe { T::from_links(NonNull::new_unchecked(head)) };
            return Some(unsafe { Dequeued::new(element, &self.guard) });
        }
    }

    /// Point-in-time view of the queue's shared state.
    ///
    /// Fields are loaded one after the other, so under concurrent use they
    /// need not be mutually consistent.
    ///
    pub fn snapshot(&self) -> QueueSnapshot {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);

        QueueSnapshot {
            head: head.addr(),
            tail: tail.addr(),
            head_is_dummy: self.pool.contains(head),
            tail_is_dummy: self.pool.contains(tail),
            has_dummy: self.has_dummy.load(Ordering::Acquire),
            dummies_in_use: self.pool.in_use(),
            dummy_states: self.pool.link_states(),
        }
    }

    /// Link `node` at the tail.
    ///
    /// # Safety
    ///
    /// `node` must stay allocated until it is detached and its deferred
    /// callback has run.
    ///
    unsafe fn enqueue_link(&self, node: NonNull<Link>) {
        // SAFETY: guaranteed by the caller.
        unsafe { node.as_ref() }.begin_enqueue();
        let node = node.as_ptr();

        let read = G::pin();

        let tail = loop {
            let tail = G::protect(&read, &self.tail);

            // SAFETY: tail is never null, and `read` keeps it allocated.
            // `next` itself is never dereferenced here.
            let next = unsafe { (*tail).load_next() };

            // Are tail and next consistent?
            if tail != self.tail.load(Ordering::Acquire) {
                continue;
            }

            debug_assert!(next != tail);

            if link::is_end(next) {
                // A detached link is invalidated before anyone could append
                // to it, so END here means `tail` is still in the queue.
                //
                // SAFETY: as above.
                if unsafe { (*tail).try_append(node) } {
                    break tail;
                }
            } else {
                debug_assert!(
                    link::is_successor(next),
                    "tail {tail:p} is neither the end nor linked"
                );

                // Tail is lagging, help advance it.
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Relaxed);
            }
        };

        // Swing tail to the new link. Failure means another thread already did.
        let _ = self
            .tail
            .compare_exchange(tail, node, Ordering::AcqRel, Ordering::Relaxed);
    }

    /// Put a dummy back into the queue unless one is already there.
    fn try_reinsert_dummy(&self) -> bool {
        if self.has_dummy.load(Ordering::Acquire) {
            return false;
        }

        let Some(index) = self.pool.acquire() else {
            debug!("dummy pool exhausted, waiting for reclamation");
            self.guard.flush();
            return false;
        };

        if self
            .has_dummy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            // Another thread beat us to it.
            self.pool.give_back(index);
            return false;
        }

        trace!(index, "re-inserting dummy");

        // SAFETY: pool links live as long as the pool, which outlives every
        // deferred callback that may still reference it.
        unsafe { self.enqueue_link(self.pool.link(index)) };
        true
    }

    fn retire_dummy(&self, index: usize) {
        trace!(index, "retiring dummy");

        let pool = Arc::clone(&self.pool);
        self.guard.defer(move || pool.free(index));
    }
}

impl<T, G> Default for LockFreeQueue<T, G>
where
    T: Linked,
    T::Handle: Send + 'static,
    G: Guard,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked, G: Guard> Drop for LockFreeQueue<T, G> {
    // `drained` is only read by `debug!`
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables, unused_assignments))]
    fn drop(&mut self) {
        // Walk head to tail and drop every element still linked.
        //
        let mut curr = *self.head.get_mut();
        let mut drained = 0usize;

        loop {
            // SAFETY: we are the only user, every link in the chain is live.
            let next = unsafe { (*curr).load_next() };

            if !self.pool.contains(curr) {
                unsafe {
                    (*curr).invalidate();
                    drop(T::from_ptr(T::from_links(NonNull::new_unchecked(curr))));
                }
                drained += 1;
            }

            if !link::is_successor(next) {
                debug_assert!(link::is_end(next), "queue chain ends without END");
                break;
            }

            curr = next;
        }

        debug!(drained, "queue dropped");
    }
}

impl<T: Linked, G: Guard> fmt::Debug for LockFreeQueue<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);

        f.debug_struct("LockFreeQueue")
            .field("head", &head)
            .field("tail", &tail)
            .field("has_dummy", &self.has_dummy.load(Ordering::Acquire))
            .field("dummies_in_use", &self.pool.in_use())
            .finish()
    }
}

// Number of outer attempts dequeue made on this thread, for bounding retries
// in tests.
#[cfg(test)]
pub(crate) mod attempts {
    use std::cell::Cell;

    thread_local! {
        static ATTEMPTS: Cell<usize> = const { Cell::new(0) };
    }

    pub(crate) fn record() {
        ATTEMPTS.with(|attempts| attempts.set(attempts.get() + 1));
    }

    pub(crate) fn take() -> usize {
        ATTEMPTS.with(|attempts| attempts.replace(0))
    }
}

// ============================================================================
// Tests - Unique to LockFreeQueue internals
// ============================================================================
// Note: Common tests are in tests/deferred_queue_tests.rs
