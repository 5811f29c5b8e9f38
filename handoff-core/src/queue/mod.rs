//! Intrusive lock-free multi-producer/multi-consumer queue.
//!
//! # Organization
//!
//! - [`link`] - Link state encoding (`Link`, `LinkState`)
//! - [`linked`] - Adapter between caller handles and embedded links
//! - `dummy_pool` - Placeholder links owned by each queue (internal)
//! - [`lock_free_queue`] - Enqueue and dequeue protocols
//! - [`dequeued`] - Guarded ownership of a dequeued element

pub mod dequeued;
pub(crate) mod dummy_pool;
pub mod link;
pub mod linked;
pub mod lock_free_queue;
pub mod snapshot;

pub use dequeued::Dequeued;
pub use dummy_pool::DUMMY_COUNT;
pub use link::{Link, LinkState, LinkStateError};
pub use linked::Linked;
pub use lock_free_queue::LockFreeQueue;
pub use snapshot::QueueSnapshot;
