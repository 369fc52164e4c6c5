//! Tick counting for the scheduling timer.

use portable_atomic::{AtomicU32, Ordering};

/// Count of scheduling ticks since the kernel started.
///
/// This counter is incremented on every timer interrupt. It wraps after
/// 2^32 ticks, which is over thirteen years at the default 100 ms period.
pub struct TickCounter {
    /// Number of ticks since start
    ticks: AtomicU32,
}

impl TickCounter {
    /// Create a counter at zero.
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Increment the tick counter (called from the tick interrupt).
    pub fn increment(&self) -> u32 {
        self.ticks.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Get the current tick count.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_returns_new_count() {
        let counter = TickCounter::new();
        assert_eq!(counter.ticks(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.ticks(), 2);
    }
}
