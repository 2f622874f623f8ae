//! Thread abstration, an abstraction of a cpu core.
//!
//! ## The threading model
//!
//! An executing kernel consists of a collection of threads, each with their
//! own saved context and scheduling state. Exactly one thread owns the
//! processor at a time. Every other live thread waits in a ready queue, is
//! parked, or is about to be destroyed.
//!
//! A [`Thread`] is always owned by exactly one of those places. Moving the
//! `Box<Thread>` from one place to another is how its state changes hands,
//! so a thread can never be both running and queued.
//!
//! ## Lifecycle
//!
//! ```text
//!  New --admit--> Runnable --select--> Running --exit--> Exited
//!                    ^                   |  |
//!                    +------yield--------+  +--park--> Parked
//!                    +---------------unpark-----------------+
//! ```
pub mod aging;
pub mod dispatch;
pub mod preempt;
pub mod queue;
pub mod scheduler;

use crate::task::Task;
use abyss::{context::Context, interrupt::Ticks};
use alloc::{boxed::Box, string::String};
use core::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a thread.
pub type ThreadId = u64;

/// A possible state of the thread.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ThreadState {
    /// Thread is created but never admitted.
    New,
    /// Thread is runnable.
    Runnable,
    /// Thread is running.
    Running,
    /// Thread is parked.
    Parked,
    /// Thread is exited with exitcode.
    Exited(i32),
    /// Thread is idle.
    Idle,
}

/// An thread abstraction.
pub struct Thread {
    /// Thread id
    pub tid: ThreadId,
    /// Thread name
    pub name: String,
    pub(crate) state: ThreadState,
    pub(crate) priority: u32,
    pub(crate) burst: f64,
    pub(crate) ready_tick: Ticks,
    pub(crate) start_tick: Ticks,
    pub(crate) context: Context,
    pub(crate) task: Option<Box<dyn Task>>,
}

impl Thread {
    pub(crate) fn new<I>(name: I) -> Box<Self>
    where
        String: From<I>,
    {
        static TID: AtomicU64 = AtomicU64::new(0);
        let tid = TID.fetch_add(1, Ordering::SeqCst);

        Box::new(Self {
            tid,
            name: String::from(name),
            state: ThreadState::New,
            priority: 0,
            burst: 0.0,
            ready_tick: 0,
            start_tick: 0,
            context: Context::new(tid),
            task: None,
        })
    }

    /// Transmute the booting context into the idle thread.
    pub(crate) fn idle() -> Box<Self> {
        let mut th = Self::new("idle");
        th.state = ThreadState::Idle;
        th
    }

    /// State of the thread.
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Scheduling priority. Larger is more important.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Predicted length of the next CPU burst, in ticks.
    pub fn burst_estimate(&self) -> f64 {
        self.burst
    }

    /// Tick at which the thread last entered a ready queue or was last aged.
    pub fn ready_tick(&self) -> Ticks {
        self.ready_tick
    }

    /// Tick at which the thread last got the processor.
    pub fn start_tick(&self) -> Ticks {
        self.start_tick
    }

    /// The saved execution context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[doc(hidden)]
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Whether the thread runs a user program.
    pub fn has_task(&self) -> bool {
        self.task.is_some()
    }

    /// Raises the priority by `step` and restarts the waiting clock.
    ///
    /// Returns the priority before aging.
    pub(crate) fn age(&mut self, step: u32, now: Ticks) -> u32 {
        let old = self.priority;
        self.priority = old.saturating_add(step);
        self.ready_tick = now;
        old
    }

    /// Folds the length of the burst that just ended into the prediction.
    pub(crate) fn predict_burst(&mut self, executed: Ticks) {
        self.burst = executed as f64 / 2.0 + self.burst / 2.0;
    }

    pub(crate) fn check_overflow(&self) {
        if self.context.is_overflowed() {
            panic!(
                "Stack overflow detected! Thread {} ({}) overran its stack guard.",
                self.tid, self.name
            );
        }
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("burst", &self.burst)
            .finish()
    }
}

/// A handle that represent the parked thread.
///
/// The handle is the only way to wake the thread up, and it is consumed by
/// [`Kernel::unpark`], so a thread is unparked at most once per park.
///
/// [`Kernel::unpark`]: crate::Kernel::unpark
#[derive(Debug, PartialEq, Eq)]
pub struct ParkHandle {
    pub(crate) tid: ThreadId,
}

impl ParkHandle {
    /// Thread id of the parked thread.
    pub fn tid(&self) -> ThreadId {
        self.tid
    }
}

/// A struct to build a new thread.
pub struct ThreadBuilder {
    th: Box<Thread>,
}

impl ThreadBuilder {
    /// Create a new thread builder for thread `name`.
    pub fn new<I>(name: I) -> Self
    where
        String: From<I>,
    {
        Self {
            th: Thread::new(name),
        }
    }

    /// Set the initial priority.
    pub fn priority(mut self, priority: u32) -> Self {
        self.th.priority = priority;
        self
    }

    /// Set the initial burst prediction. Defaults to zero.
    ///
    /// # Panics
    ///
    /// Panics if `burst` is negative, infinite or NaN.
    pub fn initial_burst(mut self, burst: f64) -> Self {
        assert!(
            burst.is_finite() && burst >= 0.0,
            "Invalid burst prediction {} for thread {}.",
            burst,
            self.th.tid
        );
        self.th.burst = burst;
        self
    }

    /// Attach a task to the thread.
    pub fn attach_task(mut self, task: Box<dyn Task>) -> Self {
        self.th.task = Some(task);
        self
    }

    /// Get the thread id of this thread.
    pub fn get_tid(&self) -> ThreadId {
        self.th.tid
    }

    /// Spawn the thread on `kernel`.
    pub fn spawn(self, kernel: &mut crate::Kernel) -> ThreadId {
        kernel.spawn_thread(self.th)
    }

    /// Spawn the thread as a parked state.
    pub fn spawn_as_parked(self, kernel: &mut crate::Kernel) -> ParkHandle {
        kernel.spawn_parked(self.th)
    }

    #[cfg(test)]
    pub(crate) fn into_thread(self) -> Box<Thread> {
        self.th
    }
}
