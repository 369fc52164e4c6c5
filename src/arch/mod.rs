//! Architecture abstraction layer for the context switch.
//!
//! The kernel decides which thread runs next in the tick interrupt and
//! leaves the actual register swap to a lower-priority, software-pendable
//! exception. This module provides the interface to that exception and to
//! interrupt masking.

pub mod frame;

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations program the interrupt controller and the core's stack
/// pointers. The switch handler they install must save and restore exactly
/// the layout described in [`frame`].
pub trait Arch {
    /// Mark the context-switch exception pending.
    ///
    /// The exception runs once no higher-priority handler is active, so
    /// calling this from the tick handler defers the switch until the tick
    /// handler has returned.
    fn pend_switch();

    /// Enable interrupts on the current CPU.
    fn enable_interrupts();

    /// Disable interrupts on the current CPU.
    fn disable_interrupts();

    /// Check if interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Run `f` with interrupts disabled, restoring the previous state after.
    fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
        let was_enabled = Self::interrupts_enabled();
        Self::disable_interrupts();
        let result = f();
        if was_enabled {
            Self::enable_interrupts();
        }
        result
    }

    /// Set exception priorities and make the first switch safe to take.
    ///
    /// # Safety
    ///
    /// Must be called once, with interrupts disabled, before the first
    /// switch is pended.
    unsafe fn prepare_first_switch();

    /// Stop the core for good.
    fn halt() -> !;
}

#[cfg(target_arch = "arm")]
pub mod cortex_m3;

#[cfg(all(not(target_arch = "arm"), any(test, feature = "std-shim")))]
pub mod sim;

#[cfg(all(not(target_arch = "arm"), not(test), not(feature = "std-shim")))]
compile_error!("This library only supports ARM Cortex-M3. Use --target thumbv7m-none-eabi or enable the std-shim feature for testing.");
