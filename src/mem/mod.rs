//! Memory management for thread stacks.
//!
//! Stacks are statically sized buffers owned by exactly one thread each.
//! There is no allocator.

pub mod stack;

pub use stack::{StackRegion, ThreadStack, GUARD_PATTERN, GUARD_WORDS, MIN_STACK_WORDS};
