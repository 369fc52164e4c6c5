//! Integration tests for the complete tick, decide, switch cycle.

use super::helpers::*;
use crate::arch::frame::{fill_pattern, FRAME_WORDS, XPSR_THUMB};
use crate::arch::sim::{SimArch, SimCpu};
use crate::errors::ConfigError;
use crate::platform_timer::ManualTick;
use crate::thread::ThreadId;

#[test]
fn test_first_switch_enters_slot_zero() {
    let kernel = kernel_with::<2>(2);
    let cpu = boot(&kernel);

    assert_eq!(kernel.current_thread(), Some(ThreadId::from_slot(0)));
    assert_eq!(running_slot(&cpu), Some(0));
    for n in 0..=12 {
        assert_eq!(cpu.reg(n), fill_pattern(n as u32), "r{}", n);
    }
    assert_eq!(kernel.switch_count(), 1);

    // The initial frame was consumed, so the thread runs at the top of its
    // stack
    let tcb = kernel.thread(ThreadId::from_slot(0)).unwrap();
    assert_eq!(cpu.psp(), tcb.stack().addr_of(tcb.stack().top_index()));
}

#[test]
fn test_round_robin_rotation() {
    let kernel = kernel_with::<3>(3);
    let mut cpu = boot(&kernel);

    let expected = [1, 2, 0, 1, 2, 0, 1];
    for &slot in &expected {
        cpu.tick(&kernel);
        assert_eq!(kernel.current_thread(), Some(ThreadId::from_slot(slot)));
        assert_eq!(running_slot(&cpu), Some(slot));
    }
    assert_eq!(kernel.ticks(), expected.len() as u32);
    assert_eq!(kernel.switch_count(), 1 + expected.len() as u32);
}

#[test]
fn test_fresh_thread_starts_at_entry() {
    let kernel = kernel_with::<2>(2);
    let mut cpu = boot(&kernel);

    cpu.tick(&kernel);
    assert_eq!(cpu.pc(), entry_pc(1));
    assert_eq!(cpu.reg(4), fill_pattern(4));
    assert_eq!(cpu.reg(11), fill_pattern(11));

    let tcb = kernel.thread(ThreadId::from_slot(1)).unwrap();
    assert_eq!(cpu.psp(), tcb.stack().addr_of(tcb.stack().top_index()));
}

#[test]
fn test_registers_survive_round_trip() {
    let kernel = kernel_with::<2>(2);
    let mut cpu = boot(&kernel);

    for n in 0..=12 {
        cpu.set_reg(n, 0xA000_0000 | n as u32);
    }
    let psp_a = cpu.psp();

    cpu.tick(&kernel);
    assert_eq!(running_slot(&cpu), Some(1));

    // A's image sits on A's stack while B runs
    let a = kernel.thread(ThreadId::from_slot(0)).unwrap();
    let frame = a.saved_frame();
    assert_eq!(frame.software[0], 0xA000_0004);
    assert_eq!(frame.software[7], 0xA000_000B);
    assert_eq!(frame.pc(), entry_pc(0));
    assert_eq!(frame.xpsr(), XPSR_THUMB);
    assert_eq!(a.saved_stack_pointer(), psp_a.wrapping_sub(FRAME_WORDS));

    for n in 0..=12 {
        cpu.set_reg(n, 0xB000_0000 | n as u32);
    }

    cpu.tick(&kernel);
    assert_eq!(running_slot(&cpu), Some(0));
    for n in 0..=12 {
        assert_eq!(cpu.reg(n), 0xA000_0000 | n as u32, "r{}", n);
    }
    assert_eq!(cpu.psp(), psp_a);

    cpu.tick(&kernel);
    assert_eq!(running_slot(&cpu), Some(1));
    for n in 0..=12 {
        assert_eq!(cpu.reg(n), 0xB000_0000 | n as u32, "r{}", n);
    }
}

#[test]
fn test_single_thread_never_switches() {
    let kernel = kernel_with::<1>(1);
    let mut cpu = boot(&kernel);

    for n in 0..=12 {
        cpu.set_reg(n, 0x5EED_0000 | n as u32);
    }
    let psp = cpu.psp();
    let tcb = kernel.thread(ThreadId::from_slot(0)).unwrap();
    let saved = tcb.saved_sp_index();

    for _ in 0..5 {
        cpu.tick(&kernel);
    }

    assert_eq!(kernel.current_thread(), Some(ThreadId::from_slot(0)));
    assert_eq!(kernel.switch_count(), 1);
    assert_eq!(tcb.activations(), 1);
    assert_eq!(tcb.saved_sp_index(), saved);
    assert_eq!(cpu.psp(), psp);
    for n in 0..=12 {
        assert_eq!(cpu.reg(n), 0x5EED_0000 | n as u32);
    }
}

#[test]
fn test_trigger_without_decision_is_noop() {
    let kernel = kernel_with::<2>(2);
    let mut cpu = boot(&kernel);

    cpu.set_reg(7, 0x7777_7777);
    let psp = cpu.psp();
    let saved_b = kernel.thread(ThreadId::from_slot(1)).unwrap().saved_sp_index();

    cpu.trigger_switch(&kernel);

    assert_eq!(kernel.current_thread(), Some(ThreadId::from_slot(0)));
    assert_eq!(kernel.switch_count(), 1);
    assert_eq!(cpu.psp(), psp);
    assert_eq!(cpu.reg(7), 0x7777_7777);
    assert_eq!(
        kernel.thread(ThreadId::from_slot(1)).unwrap().saved_sp_index(),
        saved_b
    );
}

#[test]
fn test_tick_during_pending_switch_advances_once() {
    let kernel = kernel_with::<3>(3);
    let mut cpu = boot(&kernel);

    // Second tick lands before PendSV gets to run
    kernel.on_tick();
    kernel.on_tick();
    assert_eq!(kernel.ticks(), 2);
    assert_eq!(kernel.next_thread(), Some(ThreadId::from_slot(1)));

    assert!(cpu.take_pending_switch(&kernel));
    assert!(!cpu.take_pending_switch(&kernel));
    assert_eq!(running_slot(&cpu), Some(1));
    assert_eq!(kernel.switch_count(), 2);

    cpu.set_reg(5, 0x5555_0001);
    let psp = cpu.psp();
    cpu.trigger_switch(&kernel);

    assert_eq!(cpu.psp(), psp);
    assert_eq!(cpu.reg(5), 0x5555_0001);
    assert_eq!(running_slot(&cpu), Some(1));
    assert_eq!(kernel.switch_count(), 2);
}

#[test]
fn test_tick_before_first_switch_is_ignored() {
    let kernel = kernel_with::<2>(2);
    let mut tick = ManualTick::new();
    kernel.start(&mut tick).unwrap();

    // SysTick outranks PendSV, so a tick can land before the first switch
    kernel.on_tick();
    assert_eq!(kernel.next_thread(), Some(ThreadId::from_slot(0)));
    assert_eq!(kernel.current_thread(), None);
    assert_eq!(kernel.ticks(), 1);

    let mut cpu = SimCpu::new();
    assert!(cpu.take_pending_switch(&kernel));
    assert_eq!(running_slot(&cpu), Some(0));
}

#[test]
fn test_registration_after_start_rejected() {
    let kernel = kernel_with::<3>(2);
    let mut cpu = boot(&kernel);

    assert_eq!(
        kernel.register(ENTRIES[2], leaked_stack(TEST_STACK_WORDS)),
        Err(ConfigError::SchedulingStarted)
    );
    assert_eq!(kernel.registered(), 2);

    for &slot in &[1, 0, 1, 0] {
        cpu.tick(&kernel);
        assert_eq!(running_slot(&cpu), Some(slot));
    }
}

#[test]
fn test_two_threads_share_the_core_fairly() {
    let kernel = kernel_with::<2>(2);
    let mut cpu = boot(&kernel);

    for _ in 0..101 {
        cpu.tick(&kernel);
    }

    let a = kernel.thread(ThreadId::from_slot(0)).unwrap().activations();
    let b = kernel.thread(ThreadId::from_slot(1)).unwrap().activations();
    assert_eq!(a + b, kernel.switch_count());
    assert!(a.abs_diff(b) <= 1, "a = {}, b = {}", a, b);
}

#[test]
fn test_every_tick_pends_a_decision() {
    let kernel = kernel_with::<2>(2);
    let mut cpu = boot(&kernel);
    let after_start = SimArch::pend_requests();

    cpu.tick(&kernel);
    cpu.tick(&kernel);
    assert_eq!(SimArch::pend_requests(), after_start + 2);
    assert!(!SimArch::switch_pending());
}

#[cfg(feature = "stack-guard")]
#[test]
#[should_panic(expected = "kernel fault")]
fn test_stack_overflow_halts() {
    let kernel = kernel_with::<2>(2);
    let mut cpu = boot(&kernel);

    // Thread 0 runs past the bottom of its stack
    let tcb = kernel.thread(ThreadId::from_slot(0)).unwrap();
    unsafe { tcb.stack().addr_of(1).write_volatile(0) };

    cpu.tick(&kernel);
}
