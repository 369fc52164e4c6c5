//! Scheduler trait definition.

use crate::thread::ThreadId;

/// Scheduling policy consulted by the kernel.
///
/// The policy only decides; it never switches. It is called from the tick
/// interrupt, so implementations must be short and must not block.
pub trait Scheduler: Send + Sync {
    /// Thread to run first once the kernel starts.
    ///
    /// # Arguments
    ///
    /// * `registered` - Number of registered threads, at least one
    fn pick_first(&self, registered: usize) -> ThreadId {
        debug_assert!(registered > 0);
        ThreadId::from_slot(0)
    }

    /// Pick the thread to run after the next switch point.
    ///
    /// # Arguments
    ///
    /// * `current` - The thread whose stack is live on the CPU
    /// * `registered` - Number of registered threads, at least one
    ///
    /// # Returns
    ///
    /// The thread to switch to. Returning `current` means no switch.
    fn pick_next(&self, current: ThreadId, registered: usize) -> ThreadId;
}
