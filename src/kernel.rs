//! Kernel abstraction for managing the threading system.
//!
//! This module provides the main `Kernel` struct: a fixed table of thread
//! control blocks, the scheduling decision taken on every tick, and the
//! stack pointer exchange performed by the switch exception.
//!
//! The kernel lives in a `static`. Everything it shares with interrupt
//! handlers is atomic, and the thread table is only written before
//! scheduling starts.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use portable_atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::arch::Arch;
use crate::errors::{ConfigError, KernelError};
use crate::mem::{StackRegion, ThreadStack, MIN_STACK_WORDS};
use crate::platform_timer::TickSource;
use crate::sched::Scheduler;
use crate::thread::{Tcb, ThreadEntry, ThreadId};
use crate::time::TickCounter;

/// Sentinel for "no thread" in the current/next slots.
const NO_THREAD: usize = usize::MAX;

/// One entry of the thread table.
struct ThreadSlot {
    tcb: UnsafeCell<Option<Tcb>>,
}

impl ThreadSlot {
    const fn empty() -> Self {
        Self {
            tcb: UnsafeCell::new(None),
        }
    }
}

/// Main kernel handle that manages the threading system.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
/// * `S` - Scheduler implementation
/// * `N` - Capacity of the thread table
pub struct Kernel<A: Arch, S: Scheduler, const N: usize> {
    /// Scheduler instance
    scheduler: S,
    /// Thread table, filled in registration order
    slots: [ThreadSlot; N],
    /// Number of filled slots, published with release ordering
    registered: AtomicUsize,
    /// Set once by `start`
    started: AtomicBool,
    /// Slot of the thread on the core, or NO_THREAD
    current: AtomicUsize,
    /// Slot the next switch will resume, or NO_THREAD
    next: AtomicUsize,
    /// Ticks observed since boot
    ticks: TickCounter,
    /// Switches that actually changed the running thread
    switches: AtomicU32,
    /// Architecture marker (zero-sized)
    _arch: PhantomData<A>,
}

// SAFETY: slots are written only during registration, inside a critical
// section and before `registered` publishes them. After that they are
// read-only apart from their own atomics.
unsafe impl<A: Arch, S: Scheduler, const N: usize> Sync for Kernel<A, S, N> {}

impl<A: Arch, S: Scheduler, const N: usize> Kernel<A, S, N> {
    /// Create a new kernel instance with an empty thread table.
    pub const fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            slots: [const { ThreadSlot::empty() }; N],
            registered: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            current: AtomicUsize::new(NO_THREAD),
            next: AtomicUsize::new(NO_THREAD),
            ticks: TickCounter::new(),
            switches: AtomicU32::new(0),
            _arch: PhantomData,
        }
    }

    /// Register a thread that will start running `entry` on `stack`.
    ///
    /// Threads run in registration order. The initial register image is
    /// written to the stack here, so the first switch to the thread needs
    /// no special case.
    ///
    /// # Errors
    ///
    /// Fails once scheduling has started, when the table is full, or when
    /// the stack cannot hold a frame. The region is dropped on failure.
    pub fn register(
        &self,
        entry: ThreadEntry,
        stack: StackRegion,
    ) -> Result<ThreadId, ConfigError> {
        self.register_with(entry, || Ok(stack))
    }

    /// Register a thread on a statically allocated stack.
    ///
    /// The stack is only taken once the registration is known to succeed,
    /// so a rejected thread leaves `stack` free.
    pub fn register_static<const WORDS: usize>(
        &self,
        entry: ThreadEntry,
        stack: &'static ThreadStack<WORDS>,
    ) -> Result<ThreadId, ConfigError> {
        self.register_with(entry, || {
            // ThreadStack is 8-byte aligned and MIN_STACK_WORDS is even, so
            // this matches the check Tcb::new makes on the region
            if WORDS < MIN_STACK_WORDS {
                return Err(ConfigError::StackTooSmall {
                    words: WORDS,
                    required: MIN_STACK_WORDS,
                });
            }
            stack.take()
        })
    }

    fn register_with(
        &self,
        entry: ThreadEntry,
        stack: impl FnOnce() -> Result<StackRegion, ConfigError>,
    ) -> Result<ThreadId, ConfigError> {
        A::without_interrupts(|| {
            if self.is_started() {
                return Err(ConfigError::SchedulingStarted);
            }

            let slot = self.registered.load(Ordering::Acquire);
            if slot >= N {
                return Err(ConfigError::TooManyThreads { capacity: N });
            }

            let id = ThreadId::from_slot(slot);
            let tcb = Tcb::new(id, entry, stack()?, thread_exit_trap as usize)?;

            log::debug!(
                "thread {} registered: stack {:#x}, {} words, sp index {}",
                id,
                tcb.stack().base_addr(),
                tcb.stack().len(),
                tcb.saved_sp_index()
            );

            // SAFETY: slot is unpublished and we are inside a critical
            // section before start, so nothing else can observe it.
            unsafe { *self.slots[slot].tcb.get() = Some(tcb) };
            self.registered.store(slot + 1, Ordering::Release);
            Ok(id)
        })
    }

    /// Begin preemptive scheduling.
    ///
    /// Selects the first thread, pends the first switch, starts the tick
    /// and unmasks interrupts. On hardware the switch is taken as soon as
    /// interrupts are unmasked and the boot context never runs again.
    ///
    /// # Errors
    ///
    /// Fails with no registered threads or when called a second time. On
    /// failure the interrupt mask is left as the caller had it.
    pub fn start<T: TickSource>(&self, tick: &mut T) -> Result<(), ConfigError> {
        let was_enabled = A::interrupts_enabled();
        A::disable_interrupts();

        let registered = self.registered();
        let checked = if registered == 0 {
            Err(ConfigError::NoThreads)
        } else if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            Err(ConfigError::AlreadyStarted)
        } else {
            Ok(())
        };
        if let Err(err) = checked {
            if was_enabled {
                A::enable_interrupts();
            }
            return Err(err);
        }

        let first = self.scheduler.pick_first(registered);
        self.next.store(first.slot(), Ordering::Release);

        // SAFETY: interrupts are masked and this is the only call that gets
        // past the `started` exchange.
        unsafe { A::prepare_first_switch() };
        A::pend_switch();
        tick.enable();

        log::info!("scheduling {} threads, first is {}", registered, first);

        A::enable_interrupts();
        Ok(())
    }

    /// Tick handler body.
    ///
    /// Counts the tick and, once a thread is running, selects its successor
    /// and pends the switch. Runs at the highest priority and never touches
    /// register state itself.
    pub fn on_tick(&self) {
        self.ticks.increment();

        if !self.is_started() {
            return;
        }
        let current = self.current.load(Ordering::Acquire);
        if current == NO_THREAD {
            // First switch still pending
            return;
        }

        let next = self
            .scheduler
            .pick_next(ThreadId::from_slot(current), self.registered());
        self.next.store(next.slot(), Ordering::Release);
        A::pend_switch();
    }

    /// Switch exception body.
    ///
    /// Takes the stack pointer of the outgoing context after its callee-saved
    /// registers were pushed, and returns the stack pointer to restore them
    /// from. When nothing needs to change, `saved_sp` comes back untouched.
    ///
    /// # Safety
    ///
    /// Must only be called from the switch exception, with `saved_sp`
    /// pointing at a complete frame of the outgoing context.
    pub unsafe fn switch_context(&self, saved_sp: *mut u32) -> *mut u32 {
        let next = self.next.load(Ordering::Acquire);
        let current = self.current.load(Ordering::Relaxed);

        if next == NO_THREAD || next == current {
            return saved_sp;
        }

        if let Some(outgoing) = self.thread_at(current) {
            if let Err(err) = outgoing.save_stack_pointer(saved_sp) {
                fatal(KernelError::Stack(err));
            }
        }

        let Some(incoming) = self.thread_at(next) else {
            return saved_sp;
        };

        self.current.store(next, Ordering::Release);
        incoming.note_activation();
        self.switches.fetch_add(1, Ordering::Relaxed);
        incoming.saved_stack_pointer()
    }

    /// Thread on the core, if scheduling has switched to one.
    pub fn current_thread(&self) -> Option<ThreadId> {
        slot_to_id(self.current.load(Ordering::Acquire))
    }

    /// Thread the next switch will resume.
    pub fn next_thread(&self) -> Option<ThreadId> {
        slot_to_id(self.next.load(Ordering::Acquire))
    }

    /// Number of registered threads.
    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::Acquire)
    }

    /// Capacity of the thread table.
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn ticks(&self) -> u32 {
        self.ticks.ticks()
    }

    /// Switches that changed the running thread, the first one included.
    pub fn switch_count(&self) -> u32 {
        self.switches.load(Ordering::Relaxed)
    }

    /// Control block of a registered thread.
    pub fn thread(&self, id: ThreadId) -> Option<&Tcb> {
        self.thread_at(id.slot())
    }

    fn thread_at(&self, slot: usize) -> Option<&Tcb> {
        if slot >= self.registered() {
            return None;
        }
        // SAFETY: published slots are never written again.
        unsafe { (*self.slots[slot].tcb.get()).as_ref() }
    }
}

fn slot_to_id(slot: usize) -> Option<ThreadId> {
    (slot != NO_THREAD).then(|| ThreadId::from_slot(slot))
}

/// Report an unrecoverable kernel error and stop.
#[cold]
pub fn fatal(err: KernelError) -> ! {
    log::error!("kernel fault: {}", err);
    panic!("kernel fault: {}", err);
}

/// Return address planted in every initial frame. Thread entries never
/// return, so reaching this is a bug.
pub fn thread_exit_trap() -> ! {
    panic!("thread entry returned");
}

/// Bind a kernel `static` to the tick and switch exceptions.
///
/// Emits the `SysTick` handler, the switch callback and, on Cortex-M, the
/// PendSV handler that calls it. Use it once per firmware image; images
/// without a kernel keep the runtime's default PendSV.
///
/// ```ignore
/// static KERNEL: Kernel<CortexM3, RoundRobin, 2> = Kernel::new(RoundRobin::new());
/// rr_threads::bind_kernel!(KERNEL);
/// ```
#[macro_export]
macro_rules! bind_kernel {
    ($kernel:path) => {
        #[allow(non_snake_case)]
        #[no_mangle]
        extern "C" fn SysTick() {
            $kernel.on_tick();
        }

        unsafe extern "C" fn __rr_switch_context(saved_sp: *mut u32) -> *mut u32 {
            // SAFETY: only called by the PendSV handler.
            unsafe { $kernel.switch_context(saved_sp) }
        }

        #[cfg(target_arch = "arm")]
        $crate::__cortex_m3_pendsv!(__rr_switch_context);
    };
}
