//! Round-robin scheduling.

use super::trait_def::Scheduler;
use crate::thread::ThreadId;

/// Round-robin policy over the registration order.
///
/// Every tick advances to the next registered slot, wrapping to slot 0. No
/// thread ever blocks, so no slot is ever skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl RoundRobin {
    pub const fn new() -> Self {
        Self
    }
}

impl Scheduler for RoundRobin {
    fn pick_next(&self, current: ThreadId, registered: usize) -> ThreadId {
        debug_assert!(registered > 0);
        ThreadId::from_slot((current.slot() + 1) % registered)
    }
}
