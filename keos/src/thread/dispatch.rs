//! Dispatcher.
//!
//! [`Dispatcher::run`] hands the processor from the running thread to the
//! one the scheduler selected. It follows a fixed choreography:
//!
//! 1. If the outgoing thread is finishing, it is staged in the
//!    [`DestroySlot`]. A thread cannot free the stack it is running on, so
//!    it is destroyed by whoever runs next.
//! 2. The user state of the outgoing task is saved.
//! 3. The stack guard of the outgoing thread is checked.
//! 4. The burst prediction of the outgoing thread is updated with the ticks
//!    it just ran.
//! 5. The incoming thread becomes the running thread, and the switch is
//!    traced.
//! 6. The contexts are switched.
//! 7. Running again, the outgoing thread is put where its state says it
//!    belongs: back into a ready queue, into the parked set, or back into the
//!    idle slot.
//! 8. The destroy slot is drained.
//! 9. The user state of the running task is restored.
//!
//! Interrupts stay disabled from the first step to the last.
use super::{Thread, ThreadId, ThreadState, scheduler::Scheduler};
use crate::{
    config::SchedulerConfig,
    trace::{EventKind, Tracer},
};
use abyss::{
    context::ContextSwitch,
    interrupt::{InterruptGuard, InterruptState},
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap};

/// Holds at most one finished thread until it can be destroyed.
#[derive(Default)]
pub struct DestroySlot {
    th: Option<Box<Thread>>,
}

impl DestroySlot {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self { th: None }
    }

    /// Whether no thread waits for destruction.
    pub fn is_empty(&self) -> bool {
        self.th.is_none()
    }

    fn stage(&mut self, th: Box<Thread>) {
        if let Some(staged) = self.th.as_ref() {
            panic!(
                "Thread {} finishes while thread {} still waits to be destroyed.",
                th.tid, staged.tid
            );
        }
        self.th = Some(th);
    }

    fn staged_mut(&mut self) -> Option<&mut Thread> {
        self.th.as_deref_mut()
    }

    fn drain(&mut self) -> Option<Box<Thread>> {
        self.th.take()
    }
}

/// Owns the running thread and every thread that is neither ready nor
/// running.
pub struct Dispatcher {
    current: Option<Box<Thread>>,
    idle: Option<Box<Thread>>,
    idle_tid: ThreadId,
    parked: BTreeMap<ThreadId, Box<Thread>>,
    to_be_destroyed: DestroySlot,
    switcher: Box<dyn ContextSwitch>,
    config: SchedulerConfig,
    tracer: Tracer,
}

impl Dispatcher {
    /// Creates a dispatcher whose running thread is the idle thread.
    pub fn new(config: SchedulerConfig, switcher: Box<dyn ContextSwitch>, tracer: Tracer) -> Self {
        let idle = Thread::idle();
        Self {
            idle_tid: idle.tid,
            current: Some(idle),
            idle: None,
            parked: BTreeMap::new(),
            to_be_destroyed: DestroySlot::new(),
            switcher,
            config,
            tracer,
        }
    }

    /// The running thread, unless the processor is idle.
    pub fn running(&self) -> Option<&Thread> {
        self.current
            .as_deref()
            .filter(|th| th.state != ThreadState::Idle)
    }

    pub(crate) fn running_mut(&mut self) -> Option<&mut Thread> {
        self.current
            .as_deref_mut()
            .filter(|th| th.state != ThreadState::Idle)
    }

    /// Whether the idle thread owns the processor.
    pub fn is_idle(&self) -> bool {
        self.running().is_none()
    }

    /// Thread id of the idle thread.
    pub fn idle_tid(&self) -> ThreadId {
        self.idle_tid
    }

    /// Looks up a parked thread.
    pub fn parked(&self, tid: ThreadId) -> Option<&Thread> {
        self.parked.get(&tid).map(|th| th.as_ref())
    }

    /// Number of parked threads.
    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Whether no finished thread waits for destruction.
    ///
    /// This holds every time the dispatcher is not in the middle of
    /// [`Dispatcher::run`].
    pub fn is_destroy_slot_empty(&self) -> bool {
        self.to_be_destroyed.is_empty()
    }

    pub(crate) fn park_new(&mut self, mut th: Box<Thread>) {
        th.state = ThreadState::Parked;
        self.parked.insert(th.tid, th);
    }

    pub(crate) fn unpark(&mut self, tid: ThreadId) -> Option<Box<Thread>> {
        self.parked.remove(&tid)
    }

    /// Takes the idle thread out of its slot to run it.
    pub(crate) fn take_idle(&mut self) -> Option<Box<Thread>> {
        self.idle.take()
    }

    /// Hands the processor to `next`.
    ///
    /// The caller sets the state of the running thread beforehand: it stays
    /// [`ThreadState::Running`] for a yield, becomes [`ThreadState::Parked`]
    /// to park, or [`ThreadState::Exited`] together with `finishing` to
    /// exit.
    ///
    /// # Panics
    ///
    /// Panics on any broken precondition: interrupts enabled, `next` not
    /// ready, a second finishing thread while one is staged, or an overrun
    /// stack guard.
    pub fn run<S: Scheduler + ?Sized>(
        &mut self,
        guard: &InterruptGuard<'_>,
        scheduler: &mut S,
        mut next: Box<Thread>,
        finishing: bool,
    ) {
        assert_eq!(
            guard.current(),
            InterruptState::Off,
            "Dispatching with interrupts enabled."
        );
        assert!(
            matches!(next.state, ThreadState::Runnable | ThreadState::Idle),
            "Thread {} is not ready to run: {:?}",
            next.tid,
            next.state
        );
        let now = guard.now();
        let Some(prev) = self.current.take() else {
            unreachable!("No thread owns the processor.");
        };
        if finishing {
            assert!(
                matches!(prev.state, ThreadState::Exited(_)),
                "Thread {} finishes without an exit code.",
                prev.tid
            );
        }

        let mut prev = Some(prev);
        if finishing && let Some(th) = prev.take() {
            self.to_be_destroyed.stage(th);
        }
        let outgoing = match prev.as_deref_mut() {
            Some(th) => th,
            None => match self.to_be_destroyed.staged_mut() {
                Some(th) => th,
                None => unreachable!("The outgoing thread vanished."),
            },
        };

        if let Some(task) = outgoing.task.as_mut() {
            task.save_user_state();
            task.save_state();
        }
        outgoing.check_overflow();

        let executed = now.saturating_sub(outgoing.start_tick);
        if outgoing.state != ThreadState::Idle {
            outgoing.predict_burst(executed);
        }

        next.start_tick = now;
        if next.state != ThreadState::Idle {
            next.state = ThreadState::Running;
            self.tracer.emit(
                now,
                next.tid,
                self.config.tier_of(next.priority),
                EventKind::Selected,
            );
        }
        if outgoing.state != ThreadState::Idle {
            self.tracer.emit(
                now,
                outgoing.tid,
                self.config.tier_of(outgoing.priority),
                EventKind::Replaced { executed },
            );
        }
        debug!("Switching from: {} to: {}", outgoing.name, next.name);

        let incoming = self.current.insert(next);
        self.switcher
            .switch_to(&mut outgoing.context, &mut incoming.context);

        assert_eq!(
            guard.current(),
            InterruptState::Off,
            "Interrupts were enabled across a context switch."
        );
        self.finish_context_switch(guard, scheduler, prev);
    }

    fn finish_context_switch<S: Scheduler + ?Sized>(
        &mut self,
        guard: &InterruptGuard<'_>,
        scheduler: &mut S,
        prev: Option<Box<Thread>>,
    ) {
        if let Some(prev) = prev {
            match prev.state {
                ThreadState::Running => scheduler.push_to_queue(guard, prev, None),
                ThreadState::Parked => {
                    self.parked.insert(prev.tid, prev);
                }
                ThreadState::Idle => self.idle = Some(prev),
                state => unreachable!("Thread {} left the processor as {:?}", prev.tid, state),
            }
        }

        if let Some(th) = self.to_be_destroyed.drain() {
            debug!("Destroying thread {} ({})", th.tid, th.name);
            drop(th);
        }

        if let Some(task) = self.current.as_mut().and_then(|th| th.task.as_mut()) {
            task.restore_user_state();
            task.restore_state();
        }
    }
}
