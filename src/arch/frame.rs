//! Saved-register image of a switched-out thread.
//!
//! A thread that is not running keeps its whole register state on its own
//! stack, as sixteen words starting at its saved stack pointer:
//!
//! ```text
//!  sp ->  r4  r5  r6  r7  r8  r9  r10 r11     pushed by the switch handler
//!         r0  r1  r2  r3  r12 lr  pc  xpsr    pushed by exception entry
//! ```
//!
//! The switch handler cannot tell a frame built here from one it saved
//! itself, so [`build_initial_frame`] must produce exactly this layout.

use crate::errors::ConfigError;

/// Words pushed by the switch handler (r4-r11).
pub const SOFTWARE_FRAME_WORDS: usize = 8;

/// Words pushed by the core on exception entry (r0-r3, r12, lr, pc, xpsr).
pub const HARDWARE_FRAME_WORDS: usize = 8;

/// Total size of a saved-register image.
pub const FRAME_WORDS: usize = SOFTWARE_FRAME_WORDS + HARDWARE_FRAME_WORDS;

/// xPSR with only the Thumb state bit set. Cortex-M faults on return to a
/// frame without it.
pub const XPSR_THUMB: u32 = 1 << 24;

/// Stack pointer alignment required at exception entry and by the AAPCS.
pub const STACK_ALIGN_BYTES: usize = 8;

/// Word offsets of each register inside a saved frame.
pub mod offset {
    pub const R4: usize = 0;
    pub const R5: usize = 1;
    pub const R6: usize = 2;
    pub const R7: usize = 3;
    pub const R8: usize = 4;
    pub const R9: usize = 5;
    pub const R10: usize = 6;
    pub const R11: usize = 7;
    pub const R0: usize = 8;
    pub const R1: usize = 9;
    pub const R2: usize = 10;
    pub const R3: usize = 11;
    pub const R12: usize = 12;
    pub const LR: usize = 13;
    pub const PC: usize = 14;
    pub const XPSR: usize = 15;
}

/// Fill value for general register `rN` in a fresh frame: `0x0N0N0N0N`.
///
/// A register showing this pattern in a debugger was never written by the
/// thread.
pub const fn fill_pattern(register: u32) -> u32 {
    register.wrapping_mul(0x0101_0101)
}

/// Address the core should branch to for a code pointer.
///
/// Function pointers on Thumb targets carry bit 0 set. The stacked PC must
/// have it cleared.
pub fn code_address(function: usize) -> u32 {
    (function as u32) & !1
}

/// Register image of a thread at rest.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedFrame {
    /// r4-r11
    pub software: [u32; SOFTWARE_FRAME_WORDS],
    /// r0, r1, r2, r3, r12, lr, pc, xpsr
    pub hardware: [u32; HARDWARE_FRAME_WORDS],
}

impl SavedFrame {
    /// Frame that starts executing `entry` as if it had just been called
    /// with no arguments, returning into `exit_trap`.
    pub fn initial(entry: usize, exit_trap: usize) -> Self {
        let mut software = [0; SOFTWARE_FRAME_WORDS];
        for (i, word) in software.iter_mut().enumerate() {
            *word = fill_pattern(4 + i as u32);
        }

        let hardware = [
            fill_pattern(0),
            fill_pattern(1),
            fill_pattern(2),
            fill_pattern(3),
            fill_pattern(12),
            code_address(exit_trap) | 1,
            code_address(entry),
            XPSR_THUMB,
        ];

        Self { software, hardware }
    }

    /// Flatten into stack order, lowest address first.
    pub fn to_words(&self) -> [u32; FRAME_WORDS] {
        let mut words = [0; FRAME_WORDS];
        words[..SOFTWARE_FRAME_WORDS].copy_from_slice(&self.software);
        words[SOFTWARE_FRAME_WORDS..].copy_from_slice(&self.hardware);
        words
    }

    /// Read a frame back from stack order.
    pub fn from_words(words: &[u32; FRAME_WORDS]) -> Self {
        let mut frame = Self {
            software: [0; SOFTWARE_FRAME_WORDS],
            hardware: [0; HARDWARE_FRAME_WORDS],
        };
        frame.software.copy_from_slice(&words[..SOFTWARE_FRAME_WORDS]);
        frame.hardware.copy_from_slice(&words[SOFTWARE_FRAME_WORDS..]);
        frame
    }

    pub fn pc(&self) -> u32 {
        self.hardware[offset::PC - SOFTWARE_FRAME_WORDS]
    }

    pub fn lr(&self) -> u32 {
        self.hardware[offset::LR - SOFTWARE_FRAME_WORDS]
    }

    pub fn xpsr(&self) -> u32 {
        self.hardware[offset::XPSR - SOFTWARE_FRAME_WORDS]
    }
}

/// Write the initial frame for `entry` below `top` and return the word index
/// of the resulting stack pointer.
///
/// `top` is one past the highest usable word and must already be 8-byte
/// aligned; `floor` is the lowest word the frame may occupy (above any guard
/// words).
pub fn build_initial_frame(
    stack: &mut [u32],
    floor: usize,
    top: usize,
    entry: usize,
    exit_trap: usize,
) -> Result<usize, ConfigError> {
    if top > stack.len() || top < floor + FRAME_WORDS {
        return Err(ConfigError::StackTooSmall {
            words: top.saturating_sub(floor),
            required: FRAME_WORDS,
        });
    }

    let sp = top - FRAME_WORDS;
    let frame = SavedFrame::initial(entry, exit_trap);
    stack[sp..top].copy_from_slice(&frame.to_words());
    Ok(sp)
}
