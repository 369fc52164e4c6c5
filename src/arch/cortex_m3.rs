//! ARMv7-M (Cortex-M3) implementation.
//!
//! The switch itself runs in the PendSV exception, emitted into the firmware
//! image by [`bind_kernel!`](crate::bind_kernel). On entry the core has
//! already stacked r0-r3, r12, lr, pc and xpsr onto the process stack of the
//! outgoing thread; the handler pushes r4-r11 below them, hands the
//! resulting stack pointer to the kernel and unwinds whatever frame the
//! kernel hands back.

use core::cell::UnsafeCell;

use cortex_m::interrupt;
use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::SCB;
use cortex_m::register::{primask, psp};
use cortex_m_rt::{exception, ExceptionFrame};

use super::frame::SOFTWARE_FRAME_WORDS;
use super::Arch;

/// Priority of the switch exception: the lowest, so it never preempts
/// another handler.
pub const PENDSV_PRIORITY: u8 = 0xFF;

/// Priority of the tick exception: the highest configurable one.
pub const SYSTICK_PRIORITY: u8 = 0x00;

/// Scratch area the first switch pushes the boot context's r4-r11 into.
///
/// The boot code runs on the main stack, so there is no thread to save. The
/// process stack pointer is aimed here so the handler's unconditional push
/// lands somewhere harmless.
#[repr(C, align(8))]
struct BootScratch(UnsafeCell<[u32; 2 * SOFTWARE_FRAME_WORDS]>);

// SAFETY: only written by the PendSV handler, once, before any thread runs.
unsafe impl Sync for BootScratch {}

static BOOT_SCRATCH: BootScratch = BootScratch(UnsafeCell::new([0; 2 * SOFTWARE_FRAME_WORDS]));

pub struct CortexM3;

impl Arch for CortexM3 {
    fn pend_switch() {
        SCB::set_pendsv();
    }

    fn enable_interrupts() {
        // SAFETY: the kernel only enables interrupts outside critical
        // sections.
        unsafe { interrupt::enable() };
    }

    fn disable_interrupts() {
        interrupt::disable();
    }

    fn interrupts_enabled() -> bool {
        primask::read().is_inactive()
    }

    fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
        interrupt::free(|_| f())
    }

    unsafe fn prepare_first_switch() {
        // SAFETY: called once from the boot context with interrupts masked,
        // so no other owner of the core peripherals is running.
        let mut peripherals = unsafe { cortex_m::Peripherals::steal() };
        unsafe {
            peripherals
                .SCB
                .set_priority(SystemHandler::PendSV, PENDSV_PRIORITY);
            peripherals
                .SCB
                .set_priority(SystemHandler::SysTick, SYSTICK_PRIORITY);

            let top = (BOOT_SCRATCH.0.get() as *mut u32).add(2 * SOFTWARE_FRAME_WORDS);
            psp::write(top as u32);
        }
    }

    fn halt() -> ! {
        interrupt::disable();
        loop {
            cortex_m::asm::wfi();
        }
    }
}

/// Emit the context switch exception for a kernel callback.
///
/// Invoked by [`bind_kernel!`](crate::bind_kernel), so the handler only
/// exists in images that also define `$switch`. The callback takes the
/// outgoing stack pointer in r0 and returns the incoming one in r0.
/// Returning with `0xFFFFFFFD` in lr resumes thread mode on the process
/// stack, which pops the incoming thread's hardware frame.
#[doc(hidden)]
#[macro_export]
macro_rules! __cortex_m3_pendsv {
    ($switch:path) => {
        #[allow(non_snake_case)]
        #[unsafe(naked)]
        #[no_mangle]
        unsafe extern "C" fn PendSV() {
            ::core::arch::naked_asm!(
                "mrs r0, psp",
                "stmdb r0!, {{r4-r11}}",
                "cpsid i",
                "bl {switch}",
                "cpsie i",
                "ldmia r0!, {{r4-r11}}",
                "msr psp, r0",
                "mvn lr, #2",
                "bx lr",
                switch = sym $switch,
            );
        }
    };
}

#[exception]
unsafe fn HardFault(_frame: &ExceptionFrame) -> ! {
    CortexM3::halt()
}

#[exception]
unsafe fn DefaultHandler(_irqn: i16) -> ! {
    CortexM3::halt()
}
