use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use handoff_core::common_tests::queue_core_tests::*;
use handoff_core::common_tests::{Job, dequeue_with_retry};
use handoff_core::{DUMMY_COUNT, DeferredGuard, LinkState, LockFreeQueue, init_tracing};
use rstest::rstest;
use serial_test::serial;

type DeferredQueue = LockFreeQueue<Job, DeferredGuard>;

#[test]
fn test_basic() {
    init_tracing();
    test_basic_fifo::<DeferredGuard>();
}

#[test]
fn test_empty() {
    test_empty_is_idempotent::<DeferredGuard>();
}

#[test]
fn test_order() {
    test_sequential_order::<DeferredGuard>();
}

#[test]
fn test_interleaved() {
    test_interleaved_enqueue_dequeue::<DeferredGuard>();
}

#[test]
fn test_dummy_never_returned() {
    test_never_returns_dummy::<DeferredGuard>();
}

#[test]
fn test_reuse() {
    test_round_trip_reuse::<DeferredGuard>();
}

#[test]
fn test_drop() {
    test_drop_releases_elements::<DeferredGuard>();
}

#[test]
#[serial(concurrent_tests)]
fn test_concurrent() {
    test_concurrent_fill_then_drain::<DeferredGuard>();
}

#[test]
fn test_lone_element_waits_for_reclamation() {
    let queue = DeferredQueue::new();

    // Retires the initial dummy, re-inserts the second one
    queue.enqueue(Job::boxed(0, 0));
    drop(queue.dequeue().expect("first element"));

    // Retires the second dummy, nothing left to re-insert
    queue.enqueue(Job::boxed(0, 1));
    assert!(queue.dequeue().is_none());

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.free_dummies(), 0);
    assert!(!snapshot.has_dummy);
    assert_eq!(snapshot.head, snapshot.tail);

    // Still there, and comes out once the retired dummies are freed
    assert!(queue.dequeue().is_none());
    unsafe { queue.guard().reclaim() };
    assert_eq!(queue.snapshot().free_dummies(), DUMMY_COUNT);

    let job = queue.dequeue().expect("lone element after reclaim");
    assert_eq!(job.seq, 1);
}

#[test]
fn test_reclaim_frees_every_retired_dummy() {
    let queue = DeferredQueue::new();

    for seq in 0..10 {
        queue.enqueue(Job::boxed(0, seq));
        drop(dequeue_with_retry(&queue));
    }

    unsafe { queue.guard().reclaim() };
    assert_eq!(queue.guard().pending(), 0);

    let snapshot = queue.snapshot();
    assert!(snapshot.has_dummy);
    assert_eq!(snapshot.free_dummies(), DUMMY_COUNT - 1);
    assert!(
        snapshot
            .dummy_states
            .iter()
            .all(|state| matches!(state, LinkState::Free | LinkState::End))
    );
}

#[rstest]
#[case::single(1)]
#[case::pair(2)]
#[case::many(100)]
fn test_batches_keep_order(#[case] batch: usize) {
    let queue = DeferredQueue::new();

    for round in 0..5 {
        for seq in 0..batch {
            queue.enqueue(Job::boxed(round, seq));
        }
        for seq in 0..batch {
            let job = dequeue_with_retry(&queue);
            assert_eq!((job.producer, job.seq), (round, seq));
        }
        assert!(queue.dequeue().is_none());
    }
}

#[rstest]
#[case::empty(0)]
#[case::one(1)]
#[case::several(16)]
fn test_drop_with_queued_elements(#[case] queued: usize) {
    let drops = Arc::new(AtomicUsize::new(0));

    let queue = DeferredQueue::new();
    for seq in 0..queued {
        queue.enqueue(Job::tracked(0, seq, Arc::clone(&drops)));
    }
    drop(queue);

    assert_eq!(drops.load(Ordering::Relaxed), queued);
}

#[test]
fn test_dequeued_handle_taken_immediately() {
    let queue = DeferredQueue::new();
    queue.enqueue(Job::boxed(3, 7));

    let dequeued = queue.dequeue().expect("element");
    let job = unsafe { dequeued.into_handle() };

    assert_eq!((job.producer, job.seq), (3, 7));
    assert_eq!(job.link().state(), LinkState::Invalid);

    // Released, the element can go straight back in
    job.link().release();
    queue.enqueue(job);
    assert_eq!(dequeue_with_retry(&queue).seq, 7);
}

#[test]
#[should_panic(expected = "expected free")]
fn test_enqueue_unreleased_element_panics() {
    let queue = DeferredQueue::new();
    queue.enqueue(Job::boxed(0, 0));

    let job = unsafe { queue.dequeue().expect("element").into_handle() };

    // Still Invalid
    queue.enqueue(job);
}

#[test]
#[should_panic(expected = "expected free")]
fn test_enqueue_poisoned_element_panics() {
    let queue = DeferredQueue::new();
    queue.enqueue(Job::poisoned(0, 0));
}
