//! STM32F100 value-line discovery board support.
//!
//! Clock and GPIO bring-up, the two user LEDs and the DWT cycle counter.
//!
//! # Memory Map
//!
//! - RCC base: 0x40021000
//! - GPIOC base: 0x40011000

use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};

use cortex_m::peripheral::{DCB, DWT};
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::bench::CycleCounter;
use crate::config::{BLUE_LED_BIT, GREEN_LED_BIT};

pub mod logger;

// RCC registers
const RCC_BASE: usize = 0x4002_1000;
const RCC_CR: usize = RCC_BASE + 0x00; // Clock Control
const RCC_CFGR: usize = RCC_BASE + 0x04; // Clock Configuration
const RCC_APB2ENR: usize = RCC_BASE + 0x18; // APB2 peripheral clock enable

// GPIOC registers
const GPIOC_BASE: usize = 0x4001_1000;
const GPIOC_CRH: usize = GPIOC_BASE + 0x04; // Port configuration, pins 8-15
const GPIOC_BSRR: usize = GPIOC_BASE + 0x10; // Bit set/reset
const GPIOC_BRR: usize = GPIOC_BASE + 0x14; // Bit reset

// RCC_CR bits
const CR_HSION: u32 = 1 << 0;
const CR_HSIRDY: u32 = 1 << 1;
const CR_HSEON: u32 = 1 << 16;
const CR_PLLON: u32 = 1 << 24;

// RCC_CFGR fields
const CFGR_SW_MASK: u32 = 0b11;
const CFGR_SWS_MASK: u32 = 0b11 << 2;

const APB2ENR_IOPCEN: u32 = 1 << 4;

/// MODE = 11 (output, 50 MHz), CNF = 00 (push-pull)
const CRH_OUTPUT_PUSH_PULL_50MHZ: u32 = 0b0011;

/// Run the core from the 8 MHz internal oscillator with no PLL.
///
/// # Safety
///
/// Must be called once during system initialization, before anything
/// depends on the core clock.
pub unsafe fn configure_clock() {
    unsafe {
        let mut cr = read_volatile(RCC_CR as *const u32);
        cr |= CR_HSION;
        cr &= !(CR_HSEON | CR_PLLON);
        write_volatile(RCC_CR as *mut u32, cr);

        while read_volatile(RCC_CR as *const u32) & CR_HSIRDY == 0 {}

        let cfgr = read_volatile(RCC_CFGR as *const u32) & !CFGR_SW_MASK;
        write_volatile(RCC_CFGR as *mut u32, cfgr);

        // Wait until the switch status reports HSI
        while read_volatile(RCC_CFGR as *const u32) & CFGR_SWS_MASK != 0 {}
    }
}

/// Clock GPIOC and make PC8 and PC9 push-pull outputs, both driven high.
///
/// # Safety
///
/// Must be called once during system initialization, before any thread
/// touches the LEDs.
pub unsafe fn configure_gpio() {
    unsafe {
        let enr = read_volatile(RCC_APB2ENR as *const u32);
        write_volatile(RCC_APB2ENR as *mut u32, enr | APB2ENR_IOPCEN);

        let mut crh = read_volatile(GPIOC_CRH as *const u32);
        for bit in [BLUE_LED_BIT, GREEN_LED_BIT] {
            let shift = (bit as u32 - 8) * 4;
            crh &= !(0xF << shift);
            crh |= CRH_OUTPUT_PUSH_PULL_50MHZ << shift;
        }
        write_volatile(GPIOC_CRH as *mut u32, crh);
    }

    let Ok(()) = LedPin::blue().set_high();
    let Ok(()) = LedPin::green().set_high();
}

/// One output bit of port C.
///
/// Writes go through the set/reset registers, so two threads driving
/// different bits never race on a read-modify-write of the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedPin {
    mask: u32,
}

impl LedPin {
    /// PC8, the blue LED.
    pub const fn blue() -> Self {
        Self {
            mask: 1 << BLUE_LED_BIT,
        }
    }

    /// PC9, the green LED.
    pub const fn green() -> Self {
        Self {
            mask: 1 << GREEN_LED_BIT,
        }
    }
}

impl ErrorType for LedPin {
    type Error = Infallible;
}

impl OutputPin for LedPin {
    fn set_high(&mut self) -> Result<(), Infallible> {
        // SAFETY: BSRR writes only affect the bits set in `mask`.
        unsafe { write_volatile(GPIOC_BSRR as *mut u32, self.mask) };
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        // SAFETY: BRR writes only affect the bits set in `mask`.
        unsafe { write_volatile(GPIOC_BRR as *mut u32, self.mask) };
        Ok(())
    }
}

/// DWT cycle counter.
pub struct DwtCycles {
    _dwt: DWT,
}

impl DwtCycles {
    /// Enable tracing and start the counter.
    pub fn enable(mut dcb: DCB, mut dwt: DWT) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        Self { _dwt: dwt }
    }
}

impl CycleCounter for DwtCycles {
    fn cycles(&self) -> u32 {
        DWT::cycle_count()
    }
}
