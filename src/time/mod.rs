//! Tick accounting.

pub mod tick;

pub use tick::TickCounter;
