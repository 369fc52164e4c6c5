//! Build-time configuration for the kernel and the board.

use crate::errors::ConfigError;

/// Core clock after bring-up: the 8 MHz internal oscillator, no PLL.
pub const DEFAULT_CORE_CLOCK_HZ: u32 = 8_000_000;

/// Default scheduling tick period in milliseconds.
pub const DEFAULT_TICK_PERIOD_MS: u32 = 100;

/// Largest value the SysTick reload register accepts (24 bits).
pub const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Output bit driven by the blue LED thread (PC8).
pub const BLUE_LED_BIT: u8 = 8;

/// Output bit driven by the green LED thread (PC9).
pub const GREEN_LED_BIT: u8 = 9;

/// Iterations of the busy-wait loop between LED edges.
pub const LED_DELAY_ITERATIONS: u32 = 100_000;

/// Words of stack given to each LED thread.
pub const LED_STACK_WORDS: usize = 128;

/// Configuration of the periodic scheduling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConfig {
    /// Frequency of the clock feeding the tick timer
    pub core_clock_hz: u32,
    /// Time between two scheduling decisions
    pub period_ms: u32,
}

impl TickConfig {
    /// The configuration used by the firmware: 8 MHz clock, 100 ms tick.
    pub const fn new() -> Self {
        Self {
            core_clock_hz: DEFAULT_CORE_CLOCK_HZ,
            period_ms: DEFAULT_TICK_PERIOD_MS,
        }
    }

    pub const fn with_period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = period_ms;
        self
    }

    pub const fn with_core_clock_hz(mut self, core_clock_hz: u32) -> Self {
        self.core_clock_hz = core_clock_hz;
        self
    }

    /// Value to load into the timer so it wraps once per period.
    ///
    /// The timer counts `reload + 1` cycles per period, so the result is one
    /// less than the number of core cycles in a period.
    pub const fn reload_value(&self) -> Result<u32, ConfigError> {
        let cycles = (self.core_clock_hz as u64 / 1000) * self.period_ms as u64;
        if cycles == 0 || cycles - 1 > SYSTICK_MAX_RELOAD as u64 {
            return Err(ConfigError::TickPeriodOutOfRange {
                period_ms: self.period_ms,
            });
        }
        Ok((cycles - 1) as u32)
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::new()
    }
}
