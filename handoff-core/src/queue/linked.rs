use std::ptr::NonNull;

use super::Link;

/// A type that can be an element of a [`LockFreeQueue`].
///
/// The queue never allocates or frees elements. Callers hand over an owned
/// `Handle` on enqueue, the queue keeps only the raw pointer while the
/// element is linked, and a dequeue rebuilds the handle from that pointer.
///
/// # Safety
///
/// Implementations must guarantee that:
///
/// - an element does not move while it is linked (heap handles such as
///   `Box<Self>` or `Pin<Box<Self>>` satisfy this);
/// - `links` and `from_links` are exact inverses: `from_links(links(p)) == p`
///   for every element pointer `p`. For a `#[repr(C)]` type whose first field
///   is the `Link`, both are plain pointer casts;
/// - `from_ptr(into_ptr(h))` gives back an equivalent handle, and nothing
///   else owns the element while the queue holds its pointer.
///
/// Failure to uphold these invariants results in queue corruption, including
/// dangling pointers.
///
/// [`LockFreeQueue`]: super::LockFreeQueue
///
pub unsafe trait Linked {
    /// The handle owning elements of the queue.
    type Handle;

    /// Convert an owned `Handle` into a raw pointer.
    fn into_ptr(handle: Self::Handle) -> NonNull<Self>;

    /// Convert a raw pointer back into an owned `Handle`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_ptr` and must not have been converted back
    /// already.
    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle;

    /// Return the link embedded in the element pointed to by `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a valid element.
    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Link>;

    /// Return the element that embeds `links`.
    ///
    /// # Safety
    ///
    /// `links` must have been returned by `Self::links`.
    unsafe fn from_links(links: NonNull<Link>) -> NonNull<Self>;
}
