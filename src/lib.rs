#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Bare-metal preemptive round-robin threads for ARM Cortex-M3.
//!
//! This library time-slices a fixed set of threads on a single Cortex-M3
//! core. A periodic tick picks the next thread in registration order and a
//! low-priority exception swaps the register state.
//!
//! # Target Platform
//!
//! - **Hardware**: STM32F100 value-line discovery board
//! - **Core**: ARM Cortex-M3 (ARMv7-M, no FPU)
//! - **Target**: `thumbv7m-none-eabi`
//! - **Environment**: Bare-metal (no operating system)
//!
//! # Features
//!
//! - `stack-guard`: Guard pattern at the low end of each stack, checked on
//!   every switch (default)
//! - `std-shim`: Simulated architecture for running on a host
//!
//! # Quick Start
//!
//! ```ignore
//! use rr_threads::{bind_kernel, CortexM3, Kernel, RoundRobin, ThreadStack};
//!
//! static KERNEL: Kernel<CortexM3, RoundRobin, 2> = Kernel::new(RoundRobin::new());
//! static STACK_A: ThreadStack<128> = ThreadStack::new();
//! static STACK_B: ThreadStack<128> = ThreadStack::new();
//! bind_kernel!(KERNEL);
//!
//! fn main() -> ! {
//!     KERNEL.register_static(thread_a, &STACK_A)?;
//!     KERNEL.register_static(thread_b, &STACK_B)?;
//!     KERNEL.start(&mut tick)?;
//!     loop {}
//! }
//! ```
//!
//! # Architecture
//!
//! - Round-robin decision in the SysTick handler, at the highest priority
//! - Register swap in PendSV, at the lowest priority
//! - Each thread's registers live on its own stack while it is switched out
//! - Statically allocated stacks, no heap

// Core modules
pub mod arch;
pub mod bench;
pub mod config;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod platform_timer;
pub mod sched;
pub mod thread;
pub mod time;
pub mod workers;

#[cfg(target_arch = "arm")]
pub mod board;

#[cfg(any(test, feature = "std-shim"))]
extern crate std;

#[cfg(test)]
mod tests;

// Panic handler for bare-metal
#[cfg(all(target_arch = "arm", not(test), not(feature = "std-shim")))]
use core::panic::PanicInfo;

#[cfg(all(target_arch = "arm", not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    // On panic, disable interrupts and halt
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::wfi();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::Arch;

#[cfg(target_arch = "arm")]
pub use arch::cortex_m3::CortexM3;

// Kernel
pub use kernel::Kernel;

// Scheduler
pub use sched::{RoundRobin, Scheduler};

// Threads
pub use thread::{Tcb, ThreadEntry, ThreadId};

// Memory management
pub use mem::{StackRegion, ThreadStack};

// Timer
pub use platform_timer::TickSource;

// Configuration
pub use config::TickConfig;

// Errors
pub use errors::{ConfigError, KernelError, StackError};
