//! FIPS 202 cycle benchmark, then the blue LED workload.
//!
//! Runs SHA3-256, SHA3-512, SHAKE128 and SHAKE256 over 32, 64, 256 and 1024
//! byte messages, timing each case with the DWT cycle counter. Per-case
//! results go to the ITM log. Without a probe, the green LED (PC9) toggles
//! once per million cycles the whole suite took.
//!
//! # Building
//!
//! ```bash
//! cargo build --release --target thumbv7m-none-eabi --features firmware --example hash_bench
//! ```

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use embedded_hal::digital::OutputPin;
use log::LevelFilter;
use rr_threads::bench::{self, Measurement};
use rr_threads::board::{self, logger, DwtCycles, LedPin};
use rr_threads::config::LED_DELAY_ITERATIONS;
use rr_threads::workers::{busy_delay, Blinker};
use rr_threads::{Arch, CortexM3};

const CYCLES_PER_BLINK: u32 = 1_000_000;

fn report(m: &Measurement) {
    let algorithm = m.algorithm;
    log::info!(
        "{} (r={}, c={}, suffix {:#04x}{}) {:>4} bytes: {} cycles",
        algorithm.name(),
        algorithm.rate_bits(),
        algorithm.capacity_bits(),
        algorithm.suffix(),
        if algorithm.is_xof() { ", xof" } else { "" },
        m.message_len,
        m.cycles
    );
}

#[entry]
fn main() -> ! {
    logger::init(LevelFilter::Info);

    // SAFETY: first thing after reset, nothing else touches RCC or GPIOC.
    unsafe {
        board::configure_clock();
        board::configure_gpio();
    }

    let Some(peripherals) = cortex_m::Peripherals::take() else {
        CortexM3::halt()
    };
    let counter = DwtCycles::enable(peripherals.DCB, peripherals.DWT);

    let total = bench::run_suite(&counter, report);
    log::info!("suite: {} cycles", total);

    let mut green = LedPin::green();
    let mut lit = true;
    for _ in 0..total / CYCLES_PER_BLINK {
        lit = !lit;
        let Ok(()) = if lit { green.set_high() } else { green.set_low() };
        busy_delay(LED_DELAY_ITERATIONS);
    }

    Blinker::new(LedPin::blue()).run()
}
