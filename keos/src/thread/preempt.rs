//! Preemption requests.
//!
//! The scheduler never switches threads on its own initiative. When a thread
//! entering L1 should take the processor from the running thread, it asks
//! for a timer interrupt a moment later whose handler flags the interrupted
//! thread to yield on return. The running thread then goes through the
//! ordinary yield path and the scheduler picks the newcomer.
use abyss::interrupt::{Handler, IntType, Interrupt, InterruptGuard, Ticks};
use alloc::rc::Rc;

/// Turns preemption requests into timer interrupts.
pub struct PreemptionSignaler {
    handler: Handler,
    delay: Ticks,
    requests: u64,
}

impl PreemptionSignaler {
    /// Creates a signaler whose interrupts fire `delay` ticks after the
    /// request.
    pub fn new(delay: Ticks) -> Self {
        Self {
            handler: Rc::new(|ctl: &Interrupt| ctl.yield_on_return()),
            delay,
            requests: 0,
        }
    }

    /// Asks the running thread to yield once the timer fires.
    pub fn request(&mut self, guard: &InterruptGuard<'_>) {
        self.requests += 1;
        debug!(
            "Preemption requested at tick {}, fires in {} ticks",
            guard.now(),
            self.delay
        );
        guard.schedule(self.handler.clone(), self.delay, IntType::TimerInt);
    }

    /// Number of requests made so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}
