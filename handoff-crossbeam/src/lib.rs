//! Crossbeam-based reclamation for handoff queues.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation.
//!
//! # Usage
//!
//! ```ignore
//! use handoff_core::LockFreeQueue;
//! use handoff_crossbeam::EpochGuard;
//!
//! let queue: LockFreeQueue<Job, EpochGuard> = LockFreeQueue::new();
//! queue.enqueue(job);
//! ```

pub mod epoch_guard;

// Export the Guard implementation
pub use epoch_guard::EpochGuard;
