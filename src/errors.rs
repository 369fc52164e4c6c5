//! Error types for the threading kernel.
//!
//! Nothing here is meant to be recovered from at runtime. Configuration
//! errors are returned to the board code that wires the kernel together, and
//! that code halts on them. Stack errors are raised from the context switch
//! itself and always halt.

use core::fmt;

/// Top-level error type for the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The kernel was wired together incorrectly
    Config(ConfigError),
    /// A thread stack was found corrupted during a switch
    Stack(StackError),
}

/// Integration-time misuse of the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Every thread slot is already taken
    TooManyThreads {
        /// Number of slots the kernel was built with
        capacity: usize,
    },
    /// Registration attempted after the kernel was started
    SchedulingStarted,
    /// The kernel was started with no registered thread
    NoThreads,
    /// `start` was called twice
    AlreadyStarted,
    /// The stack region cannot hold the guard and the initial register image
    StackTooSmall {
        /// Usable words in the region
        words: usize,
        /// Minimum words required
        required: usize,
    },
    /// The stack buffer was already handed to a thread
    StackInUse,
    /// The tick period does not fit the timer's reload register
    TickPeriodOutOfRange {
        /// Requested period in milliseconds
        period_ms: u32,
    },
}

/// Stack corruption detected by the context switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// The guard pattern at the low end of the stack was overwritten
    GuardCorrupted {
        /// Slot of the offending thread
        slot: usize,
    },
    /// The saved stack pointer lies outside the thread's own region
    OutOfRegion {
        /// Slot of the offending thread
        slot: usize,
        /// The stack pointer handed to the switch
        address: usize,
    },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Config(e) => write!(f, "configuration error: {}", e),
            KernelError::Stack(e) => write!(f, "stack error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooManyThreads { capacity } => {
                write!(f, "all {} thread slots are registered", capacity)
            }
            ConfigError::SchedulingStarted => {
                write!(f, "threads cannot be registered after scheduling started")
            }
            ConfigError::NoThreads => write!(f, "no thread registered before start"),
            ConfigError::AlreadyStarted => write!(f, "kernel already started"),
            ConfigError::StackTooSmall { words, required } => write!(
                f,
                "stack of {} words is smaller than the {} words required",
                words, required
            ),
            ConfigError::StackInUse => write!(f, "stack already owned by a thread"),
            ConfigError::TickPeriodOutOfRange { period_ms } => {
                write!(f, "tick period of {} ms does not fit the timer", period_ms)
            }
        }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::GuardCorrupted { slot } => {
                write!(f, "stack guard of thread {} overwritten", slot)
            }
            StackError::OutOfRegion { slot, address } => write!(
                f,
                "stack pointer {:#010x} outside the stack of thread {}",
                address, slot
            ),
        }
    }
}

impl From<ConfigError> for KernelError {
    fn from(error: ConfigError) -> Self {
        KernelError::Config(error)
    }
}

impl From<StackError> for KernelError {
    fn from(error: StackError) -> Self {
        KernelError::Stack(error)
    }
}
