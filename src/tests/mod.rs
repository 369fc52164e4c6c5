//! Host test suites driving the kernel through the simulated core.

mod helpers;
mod integration;
