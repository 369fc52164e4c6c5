//! Host model of the Cortex-M switch path, for tests and the std-shim.
//!
//! [`SimArch`] records pend requests and the interrupt mask instead of
//! touching hardware. [`SimCpu`] replays what the core and the PendSV
//! handler do to the process stack, so the kernel's switch logic runs
//! against real stack memory and real frames.
//!
//! State is per host thread, so tests running in parallel do not see each
//! other's pend requests.

use std::boxed::Box;
use std::cell::RefCell;

use super::frame::{HARDWARE_FRAME_WORDS, SOFTWARE_FRAME_WORDS};
use super::Arch;
use crate::kernel::Kernel;
use crate::platform_timer::TickSource;
use crate::sched::Scheduler;

#[derive(Debug, Clone, Copy, Default)]
struct SimState {
    switch_pending: bool,
    interrupts_enabled: bool,
    pend_requests: u32,
    prepared: bool,
}

std::thread_local! {
    static CORE: RefCell<SimState> = RefCell::new(SimState::default());
}

/// Simulated architecture.
pub struct SimArch;

impl SimArch {
    /// Clear the switch-pending flag, returning whether it was set.
    pub fn take_pending() -> bool {
        CORE.with(|core| core::mem::take(&mut core.borrow_mut().switch_pending))
    }

    pub fn switch_pending() -> bool {
        CORE.with(|core| core.borrow().switch_pending)
    }

    /// Number of times a switch was pended on this host thread.
    pub fn pend_requests() -> u32 {
        CORE.with(|core| core.borrow().pend_requests)
    }

    pub fn is_prepared() -> bool {
        CORE.with(|core| core.borrow().prepared)
    }

    /// Forget everything recorded on this host thread.
    pub fn reset() {
        CORE.with(|core| *core.borrow_mut() = SimState::default());
    }
}

impl Arch for SimArch {
    fn pend_switch() {
        CORE.with(|core| {
            let mut core = core.borrow_mut();
            core.switch_pending = true;
            core.pend_requests += 1;
        });
    }

    fn enable_interrupts() {
        CORE.with(|core| core.borrow_mut().interrupts_enabled = true);
    }

    fn disable_interrupts() {
        CORE.with(|core| core.borrow_mut().interrupts_enabled = false);
    }

    fn interrupts_enabled() -> bool {
        CORE.with(|core| core.borrow().interrupts_enabled)
    }

    unsafe fn prepare_first_switch() {
        CORE.with(|core| core.borrow_mut().prepared = true);
    }

    fn halt() -> ! {
        panic!("core halted");
    }
}

/// Register file and process stack pointer of a simulated core.
///
/// Threads never execute on the host. Tests play a thread's part by writing
/// its registers between ticks, and check that the values survive a round
/// trip through the switch.
pub struct SimCpu {
    /// r4-r11
    callee_saved: [u32; SOFTWARE_FRAME_WORDS],
    /// r0, r1, r2, r3, r12, lr, pc, xpsr
    caller_saved: [u32; HARDWARE_FRAME_WORDS],
    psp: *mut u32,
    /// False until the first exception return into a thread
    in_thread: bool,
    boot_scratch: Box<[u32; 2 * SOFTWARE_FRAME_WORDS]>,
}

impl SimCpu {
    pub fn new() -> Self {
        let mut boot_scratch = Box::new([0u32; 2 * SOFTWARE_FRAME_WORDS]);
        let psp = boot_scratch.as_mut_ptr().wrapping_add(2 * SOFTWARE_FRAME_WORDS);
        Self {
            callee_saved: [0; SOFTWARE_FRAME_WORDS],
            caller_saved: [0; HARDWARE_FRAME_WORDS],
            psp,
            in_thread: false,
            boot_scratch,
        }
    }

    pub fn psp(&self) -> *mut u32 {
        self.psp
    }

    /// Program counter of the thread currently on the core.
    pub fn pc(&self) -> u32 {
        self.caller_saved[6]
    }

    pub fn in_thread(&self) -> bool {
        self.in_thread
    }

    /// Value of `rN` for N in 0..=12.
    pub fn reg(&self, n: usize) -> u32 {
        match n {
            0..=3 => self.caller_saved[n],
            4..=11 => self.callee_saved[n - 4],
            12 => self.caller_saved[4],
            _ => panic!("no general register r{}", n),
        }
    }

    pub fn set_reg(&mut self, n: usize, value: u32) {
        match n {
            0..=3 => self.caller_saved[n] = value,
            4..=11 => self.callee_saved[n - 4] = value,
            12 => self.caller_saved[4] = value,
            _ => panic!("no general register r{}", n),
        }
    }

    /// Boot scratch words, for checking the first switch stays inside them.
    pub fn boot_scratch(&self) -> &[u32] {
        &self.boot_scratch[..]
    }

    /// Start the kernel from the boot context and take the pended first
    /// switch, as the core does once interrupts are unmasked.
    pub fn start<S, T, const N: usize>(
        &mut self,
        kernel: &Kernel<SimArch, S, N>,
        tick: &mut T,
    ) -> Result<(), crate::errors::ConfigError>
    where
        S: Scheduler,
        T: TickSource,
    {
        kernel.start(tick)?;
        self.take_pending_switch(kernel);
        Ok(())
    }

    /// One SysTick interrupt, tail-chained into PendSV when it pends one.
    pub fn tick<S: Scheduler, const N: usize>(&mut self, kernel: &Kernel<SimArch, S, N>) {
        self.exception_entry();
        kernel.on_tick();
        if SimArch::take_pending() {
            self.pendsv(kernel);
        }
        self.exception_return();
    }

    /// Raise PendSV directly, without a tick deciding anything first.
    pub fn trigger_switch<S: Scheduler, const N: usize>(&mut self, kernel: &Kernel<SimArch, S, N>) {
        SimArch::pend_switch();
        self.take_pending_switch(kernel);
    }

    /// Run PendSV if it is pending. Returns whether it ran.
    pub fn take_pending_switch<S: Scheduler, const N: usize>(
        &mut self,
        kernel: &Kernel<SimArch, S, N>,
    ) -> bool {
        if !SimArch::take_pending() {
            return false;
        }
        self.exception_entry();
        self.pendsv(kernel);
        self.exception_return();
        true
    }

    /// Core stacking r0-r3, r12, lr, pc, xpsr onto the process stack.
    ///
    /// The boot context runs on the main stack, so nothing is pushed onto
    /// the process stack before the first thread runs.
    fn exception_entry(&mut self) {
        if !self.in_thread {
            return;
        }
        self.psp = self.psp.wrapping_sub(HARDWARE_FRAME_WORDS);
        for (i, &word) in self.caller_saved.iter().enumerate() {
            // SAFETY: psp points into the running thread's stack, below its
            // live data.
            unsafe { self.psp.add(i).write_volatile(word) };
        }
    }

    /// The PendSV handler body.
    fn pendsv<S: Scheduler, const N: usize>(&mut self, kernel: &Kernel<SimArch, S, N>) {
        let outgoing = self.psp.wrapping_sub(SOFTWARE_FRAME_WORDS);
        for (i, &word) in self.callee_saved.iter().enumerate() {
            // SAFETY: either the running thread's stack or the boot scratch.
            unsafe { outgoing.add(i).write_volatile(word) };
        }

        // SAFETY: called from the (simulated) switch exception only.
        let incoming = unsafe { kernel.switch_context(outgoing) };

        for (i, word) in self.callee_saved.iter_mut().enumerate() {
            // SAFETY: the kernel returns a pointer to a whole saved frame.
            *word = unsafe { incoming.add(i).read_volatile() };
        }
        self.psp = incoming.wrapping_add(SOFTWARE_FRAME_WORDS);
    }

    /// Exception return to thread mode on the process stack.
    fn exception_return(&mut self) {
        if !self.in_thread && self.psp_in_boot_scratch() {
            // No thread was selected; back to the boot context
            return;
        }
        for (i, word) in self.caller_saved.iter_mut().enumerate() {
            // SAFETY: psp points at the hardware half of a saved frame.
            *word = unsafe { self.psp.add(i).read_volatile() };
        }
        self.psp = self.psp.wrapping_add(HARDWARE_FRAME_WORDS);
        self.in_thread = true;
    }

    fn psp_in_boot_scratch(&self) -> bool {
        let base = self.boot_scratch.as_ptr() as usize;
        let addr = self.psp as usize;
        addr >= base && addr <= base + 2 * SOFTWARE_FRAME_WORDS * 4
    }
}

impl Default for SimCpu {
    fn default() -> Self {
        Self::new()
    }
}
