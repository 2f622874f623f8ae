//! Interrupt
//!
//! A uniprocessor interrupt controller. It owns the tick counter of the
//! machine, the interrupt-enable flag, and the list of pending timer
//! interrupts. Kernel code turns interrupts off by holding an
//! [`InterruptGuard`]; while a guard is alive no interrupt handler can run, which
//! is the only mutual exclusion the scheduler relies on.
use alloc::{rc::Rc, vec::Vec};
use core::cell::{Cell, RefCell};

/// A point in (simulated) time, counted in timer ticks since boot.
pub type Ticks = u64;

/// A handler that is invoked when a scheduled interrupt fires.
///
/// Handlers run with interrupts disabled.
pub type Handler = Rc<dyn Fn(&Interrupt)>;

/// Enumeration representing the interrupt state.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum InterruptState {
    /// Interrupts are enabled.
    On,
    /// Interrupts are disabled.
    Off,
}

/// The device that raised an interrupt.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum IntType {
    /// The programmable timer.
    TimerInt,
}

struct PendingInterrupt {
    when: Ticks,
    kind: IntType,
    handler: Handler,
}

/// The interrupt controller of the machine.
pub struct Interrupt {
    level: Cell<InterruptState>,
    total_ticks: Cell<Ticks>,
    pending: RefCell<Vec<PendingInterrupt>>,
    in_handler: Cell<bool>,
    yield_on_return: Cell<bool>,
    // Nesting bookkeeping for [`InterruptGuard`].
    initial_state: Cell<InterruptState>,
    cnt: Cell<isize>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    /// Creates a controller at tick 0 with interrupts enabled.
    pub fn new() -> Self {
        Self {
            level: Cell::new(InterruptState::On),
            total_ticks: Cell::new(0),
            pending: RefCell::new(Vec::new()),
            in_handler: Cell::new(false),
            yield_on_return: Cell::new(false),
            initial_state: Cell::new(InterruptState::On),
            cnt: Cell::new(0),
        }
    }

    /// Reads the current interrupt state.
    ///
    /// # Returns
    /// - [`InterruptState::On`] if interrupts are enabled.
    /// - [`InterruptState::Off`] if interrupts are disabled.
    pub fn current(&self) -> InterruptState {
        self.level.get()
    }

    /// Total ticks elapsed since boot.
    pub fn now(&self) -> Ticks {
        self.total_ticks.get()
    }

    /// Disables interrupts until the returned guard is dropped.
    ///
    /// Guards nest. Dropping the outermost one restores the state that was
    /// observed when it was created.
    pub fn disable(&self) -> InterruptGuard<'_> {
        let state = self.level.get();
        self.level.set(InterruptState::Off);

        if self.cnt.get() == 0 {
            self.initial_state.set(state);
        }
        self.cnt.set(self.cnt.get() + 1);

        InterruptGuard { ctl: self }
    }

    /// Whether any [`InterruptGuard`] is currently alive.
    pub fn is_guarded(&self) -> bool {
        self.cnt.get() > 0
    }

    /// Arranges for `handler` to be called `from_now` ticks in the future.
    ///
    /// Interrupts scheduled for the same tick fire in the order they were
    /// scheduled.
    pub fn schedule(&self, handler: Handler, from_now: Ticks, kind: IntType) {
        assert!(from_now > 0, "Interrupt must be scheduled in the future.");
        let when = self.now() + from_now;
        let mut pending = self.pending.borrow_mut();
        let pos = pending
            .iter()
            .position(|int| int.when > when)
            .unwrap_or(pending.len());
        pending.insert(
            pos,
            PendingInterrupt {
                when,
                kind,
                handler,
            },
        );
        debug!("Scheduling {:?} interrupt at tick {}", kind, when);
    }

    /// Number of interrupts that have been scheduled but not delivered.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Tick at which the earliest pending interrupt fires.
    pub fn next_pending(&self) -> Option<Ticks> {
        self.pending.borrow().first().map(|int| int.when)
    }

    /// Requests a context switch once the current interrupt handler returns.
    ///
    /// Only an interrupt handler may call this; it is how a timer interrupt
    /// preempts the running thread without switching from inside the handler.
    pub fn yield_on_return(&self) {
        assert!(
            self.in_handler.get(),
            "yield_on_return() called outside of an interrupt handler."
        );
        self.yield_on_return.set(true);
    }

    /// Advances the clock by one tick and delivers every interrupt that is
    /// due.
    ///
    /// Returns `true` when a handler asked the running thread to yield; the
    /// caller is expected to perform that yield.
    pub fn one_tick(&self) -> bool {
        assert_eq!(
            self.current(),
            InterruptState::On,
            "Clock advanced while interrupts are disabled."
        );
        self.total_ticks.set(self.total_ticks.get() + 1);

        self.level.set(InterruptState::Off);
        self.check_if_due();
        self.level.set(InterruptState::On);

        self.yield_on_return.replace(false)
    }

    fn check_if_due(&self) {
        let now = self.now();
        loop {
            let due = {
                let mut pending = self.pending.borrow_mut();
                match pending.first() {
                    Some(int) if int.when <= now => Some(pending.remove(0)),
                    _ => None,
                }
            };
            let Some(int) = due else {
                break;
            };
            debug!("Invoking {:?} interrupt at tick {}", int.kind, now);
            self.in_handler.set(true);
            (int.handler)(self);
            self.in_handler.set(false);
        }
    }

    fn load_nested_interrupt_state(&self) {
        let prev = self.cnt.get();
        assert!(prev > 0, "Mismatched InterruptGuard drop calls: {prev}");
        self.cnt.set(prev - 1);

        if prev == 1 && self.initial_state.get() == InterruptState::On {
            self.level.set(InterruptState::On);
        }
    }
}

/// An RAII-based guard for managing interrupt disabling.
///
/// When an `InterruptGuard` is created, interrupts are disabled. When it is
/// dropped, the interrupt state is restored to what it was before the guard was
/// created.
///
/// **Important:**
/// - [`InterruptGuard`] instances **must be dropped in reverse order of their
///   creation** to prevent unintended interrupt state changes.
/// - Scheduling operations take `&InterruptGuard` as a proof that the caller
///   has exclusive access to the processor.
///
/// This structure is created using [`Interrupt::disable`].
pub struct InterruptGuard<'a> {
    ctl: &'a Interrupt,
}

impl InterruptGuard<'_> {
    /// Reads the interrupt state of the controller this guard belongs to.
    pub fn current(&self) -> InterruptState {
        self.ctl.current()
    }

    /// Total ticks elapsed since boot.
    pub fn now(&self) -> Ticks {
        self.ctl.now()
    }

    /// See [`Interrupt::schedule`].
    pub fn schedule(&self, handler: Handler, from_now: Ticks, kind: IntType) {
        self.ctl.schedule(handler, from_now, kind)
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.ctl.load_nested_interrupt_state();
    }
}
