//! Statically allocated thread stacks.
//!
//! Every thread owns one fixed buffer for its whole life. The buffer is
//! handed out exactly once, so two threads can never share a stack. Its
//! lowest words optionally hold a guard pattern that the context switch
//! checks as a best-effort overflow detector.

use core::cell::UnsafeCell;
use core::ptr::NonNull;
use portable_atomic::{AtomicBool, Ordering};

use crate::arch::frame::{FRAME_WORDS, STACK_ALIGN_BYTES};
use crate::errors::ConfigError;

/// Number of guard words at the low end of each stack.
#[cfg(feature = "stack-guard")]
pub const GUARD_WORDS: usize = 4;
#[cfg(not(feature = "stack-guard"))]
pub const GUARD_WORDS: usize = 0;

/// Pattern written into the guard words.
pub const GUARD_PATTERN: u32 = 0xDEAD_BEEF;

/// Smallest stack that can hold the guard and an initial frame.
pub const MIN_STACK_WORDS: usize = GUARD_WORDS + FRAME_WORDS;

/// A statically allocated, 8-byte aligned thread stack.
///
/// Declare one per thread as a `static` and give it to the kernel with
/// [`Kernel::register_static`](crate::kernel::Kernel::register_static).
#[repr(C, align(8))]
pub struct ThreadStack<const WORDS: usize> {
    words: UnsafeCell<[u32; WORDS]>,
    taken: AtomicBool,
}

// SAFETY: the buffer is only reachable through the single StackRegion
// returned by `take`.
unsafe impl<const WORDS: usize> Sync for ThreadStack<WORDS> {}

impl<const WORDS: usize> ThreadStack<WORDS> {
    pub const fn new() -> Self {
        Self {
            words: UnsafeCell::new([0; WORDS]),
            taken: AtomicBool::new(false),
        }
    }

    /// Hand out the buffer. Fails if it was handed out before.
    ///
    /// The buffer stays taken even if the region is later dropped.
    pub fn take(&'static self) -> Result<StackRegion, ConfigError> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return Err(ConfigError::StackInUse);
        }
        let base = self.words.get() as *mut u32;
        // SAFETY: the buffer is 'static, WORDS long and now exclusively ours.
        Ok(unsafe { StackRegion::from_raw_parts(base, WORDS) })
    }
}

impl<const WORDS: usize> Default for ThreadStack<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive handle to one thread's stack memory.
///
/// Positions inside the region are word indices from its base, so the
/// saved stack pointer of a thread can always be checked against the
/// memory it owns.
#[derive(Debug)]
pub struct StackRegion {
    base: NonNull<u32>,
    words: usize,
}

// SAFETY: a region is the unique owner of its memory.
unsafe impl Send for StackRegion {}
unsafe impl Sync for StackRegion {}

impl StackRegion {
    /// Take ownership of a `'static` word buffer.
    pub fn from_static(buffer: &'static mut [u32]) -> Self {
        // SAFETY: the exclusive 'static borrow is given up for the region.
        unsafe { Self::from_raw_parts(buffer.as_mut_ptr(), buffer.len()) }
    }

    /// # Safety
    ///
    /// `base` must point to `words` writable words that stay valid forever and
    /// are not accessed through any other path.
    pub unsafe fn from_raw_parts(base: *mut u32, words: usize) -> Self {
        match NonNull::new(base) {
            Some(base) => Self { base, words },
            None => Self {
                base: NonNull::dangling(),
                words: 0,
            },
        }
    }

    /// Size in words.
    pub fn len(&self) -> usize {
        self.words
    }

    /// Address of the lowest word.
    pub fn base_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// One past the highest usable word, rounded down so the address is
    /// 8-byte aligned.
    pub fn top_index(&self) -> usize {
        let mut top = self.words;
        while top > 0 && (self.base_addr() + top * 4) % STACK_ALIGN_BYTES != 0 {
            top -= 1;
        }
        top
    }

    /// Pointer to the word at `index`.
    pub fn addr_of(&self, index: usize) -> *mut u32 {
        debug_assert!(index <= self.words);
        self.base.as_ptr().wrapping_add(index)
    }

    /// Word index of `ptr`, if it lies inside this region (the end included).
    pub fn index_of(&self, ptr: *const u32) -> Option<usize> {
        let addr = ptr as usize;
        let base = self.base_addr();
        if addr < base || addr > base + self.words * 4 || (addr - base) % 4 != 0 {
            return None;
        }
        Some((addr - base) / 4)
    }

    /// The whole region as a slice.
    ///
    /// # Safety
    ///
    /// The owning thread must not be running, and no other reference into
    /// the region may be live.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [u32] {
        // SAFETY: upheld by the caller.
        unsafe { core::slice::from_raw_parts_mut(self.base.as_ptr(), self.words) }
    }

    /// Fill the guard words with [`GUARD_PATTERN`].
    pub fn install_guard(&mut self) {
        for i in 0..GUARD_WORDS.min(self.words) {
            // SAFETY: in bounds, and `&mut self` means the thread has not run.
            unsafe { self.addr_of(i).write_volatile(GUARD_PATTERN) };
        }
    }

    /// Whether the guard words still hold their pattern.
    ///
    /// Reads volatile because the region may be the live stack of a thread.
    pub fn guard_intact(&self) -> bool {
        (0..GUARD_WORDS.min(self.words))
            // SAFETY: in bounds and word aligned.
            .all(|i| unsafe { self.addr_of(i).read_volatile() } == GUARD_PATTERN)
    }
}
