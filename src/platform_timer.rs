//! Platform timer implementations for preemptive scheduling.
//!
//! The kernel only needs to switch the periodic tick on once everything is
//! ready. The tick interrupt itself is wired to
//! [`Kernel::on_tick`](crate::kernel::Kernel::on_tick) by
//! [`bind_kernel!`](crate::bind_kernel).

/// A periodic interrupt source driving the scheduler.
pub trait TickSource {
    /// Start raising tick interrupts.
    fn enable(&mut self);
}

#[cfg(target_arch = "arm")]
pub use systick::SysTickSource;

/// SysTick, the Cortex-M core timer.
#[cfg(target_arch = "arm")]
pub mod systick {
    use cortex_m::peripheral::syst::SystClkSource;
    use cortex_m::peripheral::SYST;

    use super::TickSource;
    use crate::config::TickConfig;
    use crate::errors::ConfigError;

    /// SysTick counting core clock cycles, wrapping once per tick period.
    pub struct SysTickSource {
        syst: SYST,
        reload: u32,
    }

    impl SysTickSource {
        /// Take the timer and check `config` fits its 24-bit reload
        /// register. The timer stays stopped until [`TickSource::enable`].
        pub fn new(syst: SYST, config: TickConfig) -> Result<Self, ConfigError> {
            let reload = config.reload_value()?;
            Ok(Self { syst, reload })
        }

    }

    impl TickSource for SysTickSource {
        fn enable(&mut self) {
            self.syst.set_clock_source(SystClkSource::Core);
            self.syst.set_reload(self.reload);
            self.syst.clear_current();
            self.syst.enable_interrupt();
            self.syst.enable_counter();
        }
    }
}

/// Tick source for host tests: records whether it was enabled.
#[cfg(any(test, feature = "std-shim"))]
#[derive(Debug, Default)]
pub struct ManualTick {
    enabled: bool,
}

#[cfg(any(test, feature = "std-shim"))]
impl ManualTick {
    pub const fn new() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(any(test, feature = "std-shim"))]
impl TickSource for ManualTick {
    fn enable(&mut self) {
        self.enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_tick_enable() {
        let mut tick = ManualTick::new();
        assert!(!tick.is_enabled());
        tick.enable();
        assert!(tick.is_enabled());
    }
}
