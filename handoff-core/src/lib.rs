pub mod common_tests;
pub mod guard;
pub mod queue;
pub mod trace;

// Re-export the queue surface for convenience
pub use guard::{DeferredGuard, Guard};
pub use queue::{
    DUMMY_COUNT, Dequeued, Link, LinkState, LinkStateError, Linked, LockFreeQueue, QueueSnapshot,
};
pub use trace::init_tracing;

/*

cargo test --features tracing -- --nocapture

RUST_LOG=handoff_core=trace cargo test --features tracing test_round_trip

cargo llvm-cov --html

*/
