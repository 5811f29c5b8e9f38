use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

use super::Linked;
use crate::guard::Guard;

/// An element that was just dequeued.
///
/// A thread that loaded the element as the queue head before it was
/// detached may still read its link, so the element cannot be freed or
/// enqueued again right away. `Dequeued` gives read access now and hands
/// the owning handle back through the queue's guard once that is safe:
///
/// - dropping it drops the handle after the grace period;
/// - [`recycle`](Dequeued::recycle) passes the handle to a callback after the
///   grace period, e.g. to release the link and put the element back on a
///   free list.
///
/// The element's link is [`Invalid`](super::LinkState::Invalid) until the
/// owner calls [`Link::release`](super::Link::release).
///
pub struct Dequeued<'q, T, G>
where
    T: Linked,
    T::Handle: Send + 'static,
    G: Guard,
{
    element: NonNull<T>,
    guard: &'q G,
}

impl<'q, T, G> Dequeued<'q, T, G>
where
    T: Linked,
    T::Handle: Send + 'static,
    G: Guard,
{
    /// # Safety
    ///
    /// `element` must have been detached from a queue using `guard`, by this
    /// thread, and must come from `T::into_ptr`.
    pub(crate) unsafe fn new(element: NonNull<T>, guard: &'q G) -> Self {
        Dequeued { element, guard }
    }

    /// Raw pointer to the element.
    pub fn as_ptr(&self) -> NonNull<T> {
        self.element
    }

    /// Pass the owning handle to `recycle` once no other thread can still
    /// reach the element.
    pub fn recycle<F>(self, recycle: F)
    where
        F: FnOnce(T::Handle) + Send + 'static,
    {
        let (handle, guard) = self.into_parts();
        guard.defer(move || recycle(handle));
    }

    /// Take the owning handle immediately.
    ///
    /// # Safety
    ///
    /// No other thread may be inside a `dequeue` on the queue this element
    /// came from, and none may still hold a pointer to it from an earlier
    /// one (e.g. the queue is only used by this thread).
    ///
    pub unsafe fn into_handle(self) -> T::Handle {
        self.into_parts().0
    }

    fn into_parts(self) -> (T::Handle, &'q G) {
        let this = ManuallyDrop::new(self);

        // SAFETY: the element came from `into_ptr` and `this` is never
        // dropped, so the handle is rebuilt exactly once.
        let handle = unsafe { T::from_ptr(this.element) };
        (handle, this.guard)
    }
}

impl<T, G> Deref for Dequeued<'_, T, G>
where
    T: Linked,
    T::Handle: Send + 'static,
    G: Guard,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the element stays allocated until the handle is rebuilt.
        unsafe { self.element.as_ref() }
    }
}

impl<T, G> Drop for Dequeued<'_, T, G>
where
    T: Linked,
    T::Handle: Send + 'static,
    G: Guard,
{
    fn drop(&mut self) {
        // SAFETY: see `into_parts`, drop runs only when `into_parts` did not.
        let handle = unsafe { T::from_ptr(self.element) };
        self.guard.defer(move || drop(handle));
    }
}

impl<T, G> fmt::Debug for Dequeued<'_, T, G>
where
    T: Linked + fmt::Debug,
    T::Handle: Send + 'static,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dequeued({:?})", &**self)
    }
}
