//! Thread scheduler

use super::{
    Thread, ThreadId, ThreadState,
    preempt::PreemptionSignaler,
    queue::{QueueOrder, ReadyQueue, ReadyQueues, Tier},
};
use crate::{
    config::{L2Order, SchedulerConfig},
    trace::{EventKind, Tracer},
};
use abyss::interrupt::{InterruptGuard, Ticks};
use alloc::{boxed::Box, string::String};
use core::fmt::Write;

/// A trait for a thread scheduler.
///
/// The [`Scheduler`] trait defines the common functionality expected from a
/// thread scheduler: it keeps the threads that are ready to run and decides
/// which one runs next. It never switches threads itself; that is the job of
/// the [`Dispatcher`].
///
/// Both methods take an [`InterruptGuard`] as a proof that interrupts are off
/// for the whole operation.
///
/// [`Dispatcher`]: super::dispatch::Dispatcher
pub trait Scheduler {
    /// Pop a next thread to run.
    ///
    /// This method checks the queue and returns the next thread to run. If no
    /// threads are available, it returns `None`.
    fn next_to_run(&mut self, guard: &InterruptGuard<'_>) -> Option<Box<Thread>>;

    /// Push a thread `th` into scheduling queue.
    ///
    /// # Arguments
    ///
    /// * `th` - A boxed [`Thread`] object that represents the thread to be
    ///   added to the scheduler's queue.
    /// * `running` - The thread that owns the processor, if it is not idle.
    ///   The scheduler may decide that `th` should preempt it.
    fn push_to_queue(
        &mut self,
        guard: &InterruptGuard<'_>,
        th: Box<Thread>,
        running: Option<&Thread>,
    );
}

/// A three-level feedback queue scheduler.
pub struct Mlfq {
    pub(crate) queues: ReadyQueues,
    pub(crate) config: SchedulerConfig,
    pub(crate) tracer: Tracer,
    signaler: PreemptionSignaler,
}

impl Mlfq {
    /// Creates a scheduler with empty queues.
    pub fn new(config: SchedulerConfig, tracer: Tracer) -> Self {
        let l2 = match config.l2_order {
            L2Order::Priority => QueueOrder::HighestPriority,
            L2Order::Arrival => QueueOrder::Arrival,
        };
        Self {
            queues: ReadyQueues::new(l2),
            signaler: PreemptionSignaler::new(config.preempt_delay),
            config,
            tracer,
        }
    }

    /// The tunables in effect.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The ready queue of `tier`.
    pub fn queue(&self, tier: Tier) -> &ReadyQueue {
        self.queues.get(tier)
    }

    /// The queue `tid` waits in, if it is ready.
    pub fn tier_of(&self, tid: ThreadId) -> Option<Tier> {
        self.queues.find(tid)
    }

    /// Looks up a ready thread.
    pub fn get(&self, tid: ThreadId) -> Option<&Thread> {
        self.queues
            .find(tid)
            .and_then(|tier| self.queues.get(tier).get(tid))
    }

    /// Number of ready threads.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Whether no thread is ready.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Number of preemption requests made so far.
    pub fn preemption_requests(&self) -> u64 {
        self.signaler.requests()
    }

    /// Puts `th` into the queue its priority maps to.
    fn insert(&mut self, now: Ticks, th: Box<Thread>) -> Tier {
        let tier = self.config.tier_of(th.priority);
        self.tracer.emit(now, th.tid, tier, EventKind::Inserted);
        self.queues.get_mut(tier).insert(th);
        tier
    }

    /// Re-files the ready thread `tid` after its priority changed from
    /// `old_priority`.
    ///
    /// A thread that stays in its tier is re-sorted silently; L3 threads go
    /// to the back of L3. A thread that crosses tiers is removed from the
    /// old queue and inserted into the new one, and both moves are traced.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is not in the queue `old_priority` maps to.
    pub fn check_and_move(&mut self, now: Ticks, tid: ThreadId, old_priority: u32) {
        let from = self.config.tier_of(old_priority);
        let Some(th) = self.queues.get_mut(from).remove(tid) else {
            panic!("Thread {} is not in queue {}.", tid, from);
        };
        let to = self.config.tier_of(th.priority);
        if from == to {
            self.queues.get_mut(to).insert(th);
        } else {
            self.tracer.emit(now, tid, from, EventKind::Removed);
            self.insert(now, th);
        }
    }

    /// Renders the content of every queue, front first.
    pub fn print(&self) -> String {
        let mut out = String::new();
        for tier in Tier::ALL {
            let _ = write!(out, "{}:", tier);
            for th in self.queues.get(tier).iter() {
                let _ = write!(
                    out,
                    " {}({}, p={}, b={:.1})",
                    th.tid, th.name, th.priority, th.burst
                );
            }
            out.push('\n');
        }
        out
    }
}

impl Scheduler for Mlfq {
    fn next_to_run(&mut self, guard: &InterruptGuard<'_>) -> Option<Box<Thread>> {
        let now = guard.now();
        self.age(now);
        for tier in Tier::ALL {
            if let Some(th) = self.queues.get_mut(tier).pop_front() {
                self.tracer.emit(now, th.tid, tier, EventKind::Removed);
                return Some(th);
            }
        }
        None
    }

    fn push_to_queue(
        &mut self,
        guard: &InterruptGuard<'_>,
        mut th: Box<Thread>,
        running: Option<&Thread>,
    ) {
        match th.state {
            ThreadState::New
            | ThreadState::Runnable
            | ThreadState::Running
            | ThreadState::Parked => (),
            state => panic!("Thread {} cannot become ready from {:?}.", th.tid, state),
        }
        let now = guard.now();
        th.state = ThreadState::Runnable;
        th.ready_tick = now;
        let burst = th.burst;
        if self.insert(now, th) == Tier::L1
            && running.is_some_and(|running| burst < running.burst)
        {
            self.signaler.request(guard);
        }
    }
}
