//! Two LED threads sharing a Cortex-M3 core, switched every 100 ms.
//!
//! The blue LED (PC8) and the green LED (PC9) each blink from their own
//! thread with a busy-wait delay. Neither thread ever yields, so both LEDs
//! only blink because the tick preempts them.
//!
//! # Building
//!
//! ```bash
//! cargo build --release --target thumbv7m-none-eabi --features firmware --example two_leds
//! ```
//!
//! # Flashing
//!
//! ```bash
//! probe-rs run --chip STM32F100RB target/thumbv7m-none-eabi/release/examples/two_leds
//! ```

#![no_std]
#![no_main]

use cortex_m::peripheral::SYST;
use cortex_m_rt::entry;
use log::LevelFilter;
use rr_threads::board::{self, logger, LedPin};
use rr_threads::config::{TickConfig, LED_STACK_WORDS};
use rr_threads::kernel::fatal;
use rr_threads::platform_timer::SysTickSource;
use rr_threads::workers::Blinker;
use rr_threads::{bind_kernel, Arch, CortexM3, Kernel, KernelError, RoundRobin, ThreadStack};

static KERNEL: Kernel<CortexM3, RoundRobin, 2> = Kernel::new(RoundRobin::new());

static BLUE_STACK: ThreadStack<LED_STACK_WORDS> = ThreadStack::new();
static GREEN_STACK: ThreadStack<LED_STACK_WORDS> = ThreadStack::new();

bind_kernel!(KERNEL);

fn blue_led() -> ! {
    Blinker::new(LedPin::blue()).run()
}

fn green_led() -> ! {
    Blinker::new(LedPin::green()).run()
}

/// Register both threads and hand the core to the scheduler.
fn launch(syst: SYST) -> Result<(), KernelError> {
    let mut tick = SysTickSource::new(syst, TickConfig::new())?;

    KERNEL.register_static(blue_led, &BLUE_STACK)?;
    KERNEL.register_static(green_led, &GREEN_STACK)?;
    KERNEL.start(&mut tick)?;
    Ok(())
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

    if let Err(err) = launch(peripherals.SYST) {
        fatal(err);
    }

    // Only reached if the first switch has not been taken yet
    loop {
        cortex_m::asm::wfi();
    }
}
