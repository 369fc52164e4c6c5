//! Thread scheduler implementations.
//!
//! Provides the round-robin policy used by the kernel's tick.

pub mod rr;
pub mod trait_def;

pub use rr::RoundRobin;
pub use trait_def::Scheduler;
