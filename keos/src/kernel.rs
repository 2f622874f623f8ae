//! The kernel facade.
//!
//! [`Kernel`] wires the interrupt controller, the [`Mlfq`] scheduler and the
//! [`Dispatcher`] together, and exposes the thread operations a kernel
//! offers to its threads: spawn, yield, park, unpark and exit. Each
//! operation runs on behalf of the thread that currently owns the
//! processor, with interrupts disabled for its whole duration.
//!
//! Time only advances through [`Kernel::tick`]. A tick delivers the timer
//! interrupts that are due; when one of them requested a preemption, the
//! running thread yields as it returns from the interrupt.
use crate::{
    KernelError,
    config::{Program, SchedulerConfig},
    thread::{
        ParkHandle, Thread, ThreadBuilder, ThreadId, ThreadState,
        dispatch::Dispatcher,
        queue::Tier,
        scheduler::{Mlfq, Scheduler},
    },
    trace::{TraceSink, Tracer},
};
use abyss::{
    context::ContextSwitch,
    interrupt::{Interrupt, InterruptGuard, Ticks},
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, string::String, sync::Arc, vec::Vec};

/// Where every live thread is, at one point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Census {
    /// Threads on the processor, the idle thread excluded.
    pub running: usize,
    /// Ready threads per queue, L1 first.
    pub ready: [usize; 3],
    /// Parked threads.
    pub parked: usize,
    /// Finished threads that are not destroyed yet.
    pub staged: usize,
}

impl Census {
    /// Number of live threads.
    pub fn total(&self) -> usize {
        self.running + self.ready.iter().sum::<usize>() + self.parked + self.staged
    }
}

/// A single-processor kernel.
pub struct Kernel {
    interrupt: Interrupt,
    scheduler: Mlfq,
    dispatcher: Dispatcher,
    exit_codes: BTreeMap<ThreadId, i32>,
}

impl Kernel {
    pub(crate) fn new(
        config: SchedulerConfig,
        switcher: Box<dyn ContextSwitch>,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        let tracer = Tracer::new(sink, config.trace, config.echo_events);
        Self {
            interrupt: Interrupt::new(),
            dispatcher: Dispatcher::new(config.clone(), switcher, tracer.clone()),
            scheduler: Mlfq::new(config, tracer),
            exit_codes: BTreeMap::new(),
        }
    }

    /// The interrupt controller.
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &Mlfq {
        &self.scheduler
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Ticks elapsed since boot.
    pub fn now(&self) -> Ticks {
        self.interrupt.now()
    }

    pub(crate) fn spawn_thread(&mut self, th: Box<Thread>) -> ThreadId {
        let tid = th.tid;
        let guard = self.interrupt.disable();
        debug!("Spawning thread {} ({}) with priority {}", tid, th.name, th.priority());
        self.scheduler
            .push_to_queue(&guard, th, self.dispatcher.running());
        tid
    }

    pub(crate) fn spawn_parked(&mut self, th: Box<Thread>) -> ParkHandle {
        let tid = th.tid;
        let _guard = self.interrupt.disable();
        self.dispatcher.park_new(th);
        ParkHandle { tid }
    }

    /// Starts the program `name` with `priority`.
    pub fn exec(&mut self, name: &str, priority: u32) -> ThreadId {
        ThreadBuilder::new(name).priority(priority).spawn(self)
    }

    /// Starts every program in order.
    pub fn exec_all(&mut self, programs: &[Program]) -> Vec<ThreadId> {
        programs
            .iter()
            .map(|program| self.exec(&program.name, program.priority))
            .collect()
    }

    /// Gives up the processor to the next ready thread.
    ///
    /// The running thread goes back into a ready queue. Nothing happens when
    /// no other thread is ready. When the processor is idle, this picks up
    /// the next ready thread.
    pub fn yield_now(&mut self) {
        let guard = self.interrupt.disable();
        if let Some(next) = self.scheduler.next_to_run(&guard) {
            self.dispatcher
                .run(&guard, &mut self.scheduler, next, false);
        }
    }

    /// Parks the running thread and runs the next ready thread.
    ///
    /// The returned handle is the only way to make the thread ready again.
    pub fn park(&mut self) -> Result<ParkHandle, KernelError> {
        let guard = self.interrupt.disable();
        let th = self
            .dispatcher
            .running_mut()
            .ok_or(KernelError::OperationNotPermitted)?;
        th.state = ThreadState::Parked;
        let tid = th.tid;

        let next = Self::next_or_idle(&mut self.scheduler, &mut self.dispatcher, &guard);
        self.dispatcher
            .run(&guard, &mut self.scheduler, next, false);
        Ok(ParkHandle { tid })
    }

    /// Makes a parked thread ready again.
    pub fn unpark(&mut self, handle: ParkHandle) -> Result<(), KernelError> {
        let guard = self.interrupt.disable();
        let th = self
            .dispatcher
            .unpark(handle.tid)
            .ok_or(KernelError::NoSuchEntry)?;
        self.scheduler
            .push_to_queue(&guard, th, self.dispatcher.running());
        Ok(())
    }

    /// Finishes the running thread with `exit_code`.
    ///
    /// The thread is destroyed once the next thread runs.
    pub fn exit(&mut self, exit_code: i32) -> Result<(), KernelError> {
        let guard = self.interrupt.disable();
        let th = self
            .dispatcher
            .running_mut()
            .ok_or(KernelError::OperationNotPermitted)?;
        th.state = ThreadState::Exited(exit_code);
        let tid = th.tid;
        self.exit_codes.insert(tid, exit_code);

        let next = Self::next_or_idle(&mut self.scheduler, &mut self.dispatcher, &guard);
        self.dispatcher
            .run(&guard, &mut self.scheduler, next, true);
        Ok(())
    }

    /// Selects the thread that takes over from a thread that leaves the
    /// processor for good or for a while.
    fn next_or_idle(
        scheduler: &mut Mlfq,
        dispatcher: &mut Dispatcher,
        guard: &InterruptGuard<'_>,
    ) -> Box<Thread> {
        match scheduler.next_to_run(guard) {
            Some(next) => next,
            None => match dispatcher.take_idle() {
                Some(idle) => idle,
                None => unreachable!("The idle thread is missing while a thread is running."),
            },
        }
    }

    /// Advances the clock by one tick.
    ///
    /// The running thread yields if a timer interrupt asked for it. An idle
    /// processor picks up work as soon as some thread is ready.
    pub fn tick(&mut self) {
        if self.interrupt.one_tick() {
            debug!("Yield on return at tick {}", self.now());
            self.yield_now();
        } else if self.dispatcher.is_idle() && !self.scheduler.is_empty() {
            self.yield_now();
        }
    }

    /// Advances the clock by `ticks` ticks.
    pub fn run_for(&mut self, ticks: Ticks) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Thread id of the running thread, unless the processor is idle.
    pub fn current_tid(&self) -> Option<ThreadId> {
        self.dispatcher.running().map(|th| th.tid)
    }

    /// Run a function `f` with the running thread as an argument.
    pub fn with_current<R>(&mut self, f: impl FnOnce(&mut Thread) -> R) -> Result<R, KernelError> {
        let _guard = self.interrupt.disable();
        self.dispatcher
            .running_mut()
            .map(f)
            .ok_or(KernelError::OperationNotPermitted)
    }

    /// Get specified thread's [`ThreadState`] by TID (Thread ID).
    pub fn state_of(&self, tid: ThreadId) -> Result<ThreadState, KernelError> {
        if let Some(th) = self.dispatcher.running().filter(|th| th.tid == tid) {
            return Ok(th.state());
        }
        if let Some(th) = self
            .scheduler
            .get(tid)
            .or_else(|| self.dispatcher.parked(tid))
        {
            return Ok(th.state());
        }
        self.exit_code(tid)
            .map(ThreadState::Exited)
            .ok_or(KernelError::NoSuchEntry)
    }

    /// Exit code of a finished thread.
    ///
    /// Exit codes are kept until [`Kernel::reap`] collects them, so this
    /// table grows by one entry per finished thread.
    pub fn exit_code(&self, tid: ThreadId) -> Option<i32> {
        self.exit_codes.get(&tid).copied()
    }

    /// Collects the exit code of a finished thread and forgets the thread.
    ///
    /// Afterwards [`Kernel::state_of`] reports [`KernelError::NoSuchEntry`]
    /// for `tid`.
    pub fn reap(&mut self, tid: ThreadId) -> Option<i32> {
        self.exit_codes.remove(&tid)
    }

    /// Counts the live threads by where they are.
    pub fn census(&self) -> Census {
        let mut ready = [0; 3];
        for (slot, tier) in ready.iter_mut().zip(Tier::ALL) {
            *slot = self.scheduler.queue(tier).len();
        }
        Census {
            running: usize::from(self.dispatcher.running().is_some()),
            ready,
            parked: self.dispatcher.parked_count(),
            staged: usize::from(!self.dispatcher.is_destroy_slot_empty()),
        }
    }

    /// Logs and returns the content of the ready queues.
    pub fn print_state(&self) -> String {
        let state = self.scheduler.print();
        info!("Tick {}:\n{}", self.now(), state);
        state
    }
}
