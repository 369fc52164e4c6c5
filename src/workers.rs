//! LED blink workloads used as thread bodies.
//!
//! Each worker drives a single output bit: high, wait, low, wait, forever.
//! The wait is a plain busy loop, so the only thing that lets two workers
//! share the core is preemption by the tick.

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

use crate::config::LED_DELAY_ITERATIONS;

/// Burn roughly `iterations` loop turns.
///
/// The counter goes through `black_box` so the loop is not folded away.
#[inline(never)]
pub fn busy_delay(iterations: u32) {
    let mut i = 0u32;
    while core::hint::black_box(i) < iterations {
        i += 1;
    }
}

/// Toggles one output with a fixed busy-wait half period.
pub struct Blinker<P: OutputPin<Error = Infallible>> {
    pin: P,
    half_period: u32,
    cycles: u32,
}

impl<P: OutputPin<Error = Infallible>> Blinker<P> {
    /// Blinker with the firmware's delay of [`LED_DELAY_ITERATIONS`].
    pub fn new(pin: P) -> Self {
        Self::with_half_period(pin, LED_DELAY_ITERATIONS)
    }

    pub fn with_half_period(pin: P, half_period: u32) -> Self {
        Self {
            pin,
            half_period,
            cycles: 0,
        }
    }

    /// One full on/off cycle.
    pub fn step(&mut self) {
        let Ok(()) = self.pin.set_high();
        busy_delay(self.half_period);
        let Ok(()) = self.pin.set_low();
        busy_delay(self.half_period);
        self.cycles = self.cycles.wrapping_add(1);
    }

    /// Completed on/off cycles.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    /// Blink forever.
    pub fn run(mut self) -> ! {
        loop {
            self.step();
        }
    }
}
