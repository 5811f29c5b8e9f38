use super::{DUMMY_COUNT, LinkState};

/// Point-in-time view of a queue's shared state, for diagnostics and tests.
///
/// Addresses are plain numbers; nothing here can be dereferenced.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Address of the head link. Never zero.
    pub head: usize,
    /// Address of the tail link. Never zero.
    pub tail: usize,
    pub head_is_dummy: bool,
    pub tail_is_dummy: bool,
    /// Whether a dummy is logically in the queue.
    pub has_dummy: bool,
    /// Per pool slot: queued, or retired and waiting for reclamation.
    pub dummies_in_use: [bool; DUMMY_COUNT],
    pub dummy_states: [LinkState; DUMMY_COUNT],
}

impl QueueSnapshot {
    /// Number of pool slots available for re-insertion.
    pub fn free_dummies(&self) -> usize {
        self.dummies_in_use.iter().filter(|in_use| !**in_use).count()
    }
}
