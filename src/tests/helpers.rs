//! Test helper utilities and common functionality.

use std::boxed::Box;
use std::vec;

use crate::arch::frame::code_address;
use crate::arch::sim::{SimArch, SimCpu};
use crate::kernel::Kernel;
use crate::mem::StackRegion;
use crate::platform_timer::ManualTick;
use crate::sched::RoundRobin;
use crate::thread::{ThreadEntry, ThreadId};

/// Stack size used by test threads.
pub(crate) const TEST_STACK_WORDS: usize = 64;

pub(crate) type TestKernel<const N: usize> = Kernel<SimArch, RoundRobin, N>;

/// Distinct thread bodies, so the program counter tells threads apart.
fn parked<const K: usize>() -> ! {
    loop {
        core::hint::black_box(K);
        core::hint::spin_loop();
    }
}

pub(crate) const ENTRIES: [ThreadEntry; 8] = [
    parked::<0>,
    parked::<1>,
    parked::<2>,
    parked::<3>,
    parked::<4>,
    parked::<5>,
    parked::<6>,
    parked::<7>,
];

/// Stacked program counter a fresh thread in `slot` starts at.
pub(crate) fn entry_pc(slot: usize) -> u32 {
    code_address(ENTRIES[slot] as usize)
}

pub(crate) fn leaked_stack(words: usize) -> StackRegion {
    StackRegion::from_static(Box::leak(vec![0u32; words].into_boxed_slice()))
}

/// Kernel with `threads` registered and nothing started yet.
pub(crate) fn kernel_with<const N: usize>(threads: usize) -> TestKernel<N> {
    SimArch::reset();
    let kernel = TestKernel::<N>::new(RoundRobin::new());
    for slot in 0..threads {
        let id = kernel
            .register(ENTRIES[slot], leaked_stack(TEST_STACK_WORDS))
            .expect("registration before start");
        assert_eq!(id, ThreadId::from_slot(slot));
    }
    kernel
}

/// Start `kernel` on a fresh simulated core and take the first switch.
pub(crate) fn boot<const N: usize>(kernel: &TestKernel<N>) -> SimCpu {
    let mut cpu = SimCpu::new();
    let mut tick = ManualTick::new();
    cpu.start(kernel, &mut tick).expect("kernel starts");
    assert!(tick.is_enabled());
    assert!(cpu.in_thread());
    cpu
}

/// Slot of the thread the simulated core is executing, judged by its pc.
pub(crate) fn running_slot(cpu: &SimCpu) -> Option<usize> {
    (0..ENTRIES.len()).find(|&slot| entry_pc(slot) == cpu.pc())
}

/// Simple linear congruential generator for property testing.
pub(crate) struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    pub(crate) fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        min + (self.next_u64() % (max - min))
    }
}
