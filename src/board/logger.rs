//! `log` sink over ITM stimulus port 0.
//!
//! Messages reach the host through the debug probe's SWO pin. With no probe
//! attached, or tracing disabled, records are dropped without blocking.

use cortex_m::itm;
use cortex_m::peripheral::itm::RegisterBlock;
use cortex_m::peripheral::ITM;
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Stimulus port carrying log text.
const LOG_PORT: usize = 0;

/// ITM_TCR.ITMENA
const TCR_ITMENA: u32 = 1 << 0;

pub struct ItmLogger {
    /// Serializes writers so lines from different threads do not interleave
    port: Mutex<()>,
}

impl ItmLogger {
    pub const fn new() -> Self {
        Self { port: Mutex::new(()) }
    }

    fn port_enabled(itm: &RegisterBlock) -> bool {
        itm.tcr.read() & TCR_ITMENA != 0 && itm.ter[0].read() & (1 << LOG_PORT) != 0
    }
}

impl Default for ItmLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for ItmLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        // A thread preempted mid-line holds the lock; drop rather than spin
        // against it forever.
        let Some(_guard) = self.port.try_lock() else {
            return;
        };

        // SAFETY: stimulus port writes are serialized by `port`, and nothing
        // else in the firmware touches the ITM.
        let itm = unsafe { &mut *(ITM::PTR as *mut RegisterBlock) };
        if !Self::port_enabled(itm) {
            return;
        }

        let stim = &mut itm.stim[LOG_PORT];
        itm::write_fmt(
            stim,
            format_args!("[{}] {}: {}\n", record.level(), record.target(), record.args()),
        );
    }

    fn flush(&self) {}
}

static LOGGER: ItmLogger = ItmLogger::new();

/// Install the ITM logger. Later calls are ignored.
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
