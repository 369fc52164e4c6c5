//! Thread control blocks.
//!
//! A thread is nothing more than a stack it owns and the position of its
//! saved register image inside that stack. Threads are identified by the
//! slot they were registered into, never created after start and never
//! destroyed.

use core::fmt;
use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::arch::frame::{build_initial_frame, SavedFrame, FRAME_WORDS};
use crate::errors::{ConfigError, StackError};
use crate::mem::{StackRegion, GUARD_WORDS, MIN_STACK_WORDS};

/// Entry procedure of a thread. Threads never return.
pub type ThreadEntry = fn() -> !;

/// Identifier of a thread: the ordinal of its registration slot.
///
/// Registration order is scheduling order, so slot 0 runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    pub const fn from_slot(slot: usize) -> Self {
        Self(slot)
    }

    /// Registration slot of this thread.
    pub const fn slot(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread Control Block.
pub struct Tcb {
    /// Registration slot
    id: ThreadId,
    /// Stack memory owned by this thread
    stack: StackRegion,
    /// Word index of the saved stack pointer inside `stack`
    saved_sp: AtomicUsize,
    /// Number of times this thread was switched in
    activations: AtomicU32,
}

impl Tcb {
    /// Create a TCB and build the initial register image on its stack.
    ///
    /// `exit_trap` is the return address planted in the image; it is only
    /// reached if `entry` somehow returns.
    pub(crate) fn new(
        id: ThreadId,
        entry: ThreadEntry,
        mut stack: StackRegion,
        exit_trap: usize,
    ) -> Result<Self, ConfigError> {
        let top = stack.top_index();
        if top < MIN_STACK_WORDS {
            return Err(ConfigError::StackTooSmall {
                words: stack.len(),
                required: MIN_STACK_WORDS,
            });
        }

        stack.install_guard();

        // SAFETY: the thread has never run and we hold the only handle to the
        // region.
        let words = unsafe { stack.as_mut_slice() };
        let sp = build_initial_frame(words, GUARD_WORDS, top, entry as usize, exit_trap)?;

        Ok(Self {
            id,
            stack,
            saved_sp: AtomicUsize::new(sp),
            activations: AtomicU32::new(0),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn stack(&self) -> &StackRegion {
        &self.stack
    }

    /// Word index of the saved stack pointer.
    pub fn saved_sp_index(&self) -> usize {
        self.saved_sp.load(Ordering::Relaxed)
    }

    /// Saved stack pointer as an address, ready to be loaded into the core.
    pub fn saved_stack_pointer(&self) -> *mut u32 {
        self.stack.addr_of(self.saved_sp_index())
    }

    /// Record the stack pointer of this thread as it is switched out.
    ///
    /// Rejects a pointer outside the thread's own region and reports a
    /// damaged guard pattern. On error the TCB is left unchanged.
    pub(crate) fn save_stack_pointer(&self, sp: *mut u32) -> Result<(), StackError> {
        let slot = self.id.slot();
        let index = self
            .stack
            .index_of(sp)
            .filter(|&index| index + FRAME_WORDS <= self.stack.len())
            .ok_or(StackError::OutOfRegion {
                slot,
                address: sp as usize,
            })?;

        if index < GUARD_WORDS || !self.stack.guard_intact() {
            return Err(StackError::GuardCorrupted { slot });
        }

        self.saved_sp.store(index, Ordering::Relaxed);
        Ok(())
    }

    /// Register image at the saved stack pointer.
    ///
    /// Only meaningful while the thread is switched out.
    pub fn saved_frame(&self) -> SavedFrame {
        let sp = self.saved_stack_pointer();
        let mut words = [0u32; FRAME_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            // SAFETY: save_stack_pointer and the frame builder keep a whole
            // frame inside the region.
            *word = unsafe { sp.add(i).read_volatile() };
        }
        SavedFrame::from_words(&words)
    }

    pub fn activations(&self) -> u32 {
        self.activations.load(Ordering::Relaxed)
    }

    pub(crate) fn note_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Tcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tcb")
            .field("id", &self.id)
            .field("stack_base", &format_args!("{:#x}", self.stack.base_addr()))
            .field("stack_words", &self.stack.len())
            .field("saved_sp", &self.saved_sp_index())
            .field("activations", &self.activations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::frame::{code_address, fill_pattern, XPSR_THUMB};
    use std::boxed::Box;
    use std::vec;

    fn spin() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn trap() -> ! {
        panic!("thread returned");
    }

    fn region(words: usize) -> StackRegion {
        StackRegion::from_static(Box::leak(vec![0u32; words].into_boxed_slice()))
    }

    #[test]
    fn test_tcb_initial_frame() {
        let tcb = Tcb::new(ThreadId::from_slot(0), spin, region(64), trap as usize)
            .expect("stack is large enough");

        let top = tcb.stack().top_index();
        assert_eq!(tcb.saved_sp_index(), top - FRAME_WORDS);

        let frame = tcb.saved_frame();
        assert_eq!(frame.pc(), code_address(spin as usize));
        assert_eq!(frame.xpsr(), XPSR_THUMB);
        assert_eq!(frame.software[0], fill_pattern(4));
        assert_eq!(frame.software[7], fill_pattern(11));
        assert_eq!(tcb.activations(), 0);
    }

    #[test]
    fn test_tcb_rejects_tiny_stack() {
        let result = Tcb::new(ThreadId::from_slot(1), spin, region(8), trap as usize);
        assert_eq!(
            result.unwrap_err(),
            ConfigError::StackTooSmall { words: 8, required: MIN_STACK_WORDS }
        );
    }

    #[test]
    fn test_save_rejects_foreign_pointer() {
        let tcb = Tcb::new(ThreadId::from_slot(2), spin, region(64), trap as usize).unwrap();
        let before = tcb.saved_sp_index();

        let mut elsewhere = [0u32; 4];
        let result = tcb.save_stack_pointer(elsewhere.as_mut_ptr());
        assert!(matches!(result, Err(StackError::OutOfRegion { slot: 2, .. })));
        assert_eq!(tcb.saved_sp_index(), before);
    }

    #[test]
    fn test_save_accepts_own_pointer() {
        let tcb = Tcb::new(ThreadId::from_slot(0), spin, region(64), trap as usize).unwrap();
        let sp = tcb.stack().addr_of(40);
        tcb.save_stack_pointer(sp).expect("pointer inside region");
        assert_eq!(tcb.saved_sp_index(), 40);
        assert_eq!(tcb.saved_stack_pointer(), sp);
    }

    #[cfg(feature = "stack-guard")]
    #[test]
    fn test_save_reports_overflow_into_guard() {
        let tcb = Tcb::new(ThreadId::from_slot(1), spin, region(64), trap as usize).unwrap();
        unsafe { tcb.stack().addr_of(0).write(0) };

        let result = tcb.save_stack_pointer(tcb.stack().addr_of(20));
        assert_eq!(result, Err(StackError::GuardCorrupted { slot: 1 }));
    }

    #[test]
    fn test_thread_id_slot() {
        let id = ThreadId::from_slot(3);
        assert_eq!(id.slot(), 3);
        assert_eq!(std::format!("{}", id), "3");
    }
}
