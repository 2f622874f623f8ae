//! Aging.
//!
//! A thread that has waited in a ready queue for
//! [`aging_threshold`](crate::config::SchedulerConfig::aging_threshold) ticks
//! gains [`aging_step`](crate::config::SchedulerConfig::aging_step) priority
//! points and starts waiting anew. Aging runs right before every selection,
//! so a low priority thread eventually climbs out of L3 no matter how busy
//! the upper queues are.
use super::{ThreadId, queue::Tier, scheduler::Mlfq};
use crate::trace::EventKind;
use abyss::interrupt::Ticks;
use alloc::vec::Vec;

impl Mlfq {
    /// Ages every thread that has waited long enough.
    ///
    /// Queues are swept from L1 to L3. A thread promoted into a higher queue
    /// is therefore never aged twice in one sweep.
    pub fn age(&mut self, now: Ticks) {
        let threshold = self.config.aging_threshold;
        let step = self.config.aging_step;
        for tier in Tier::ALL {
            let due: Vec<ThreadId> = self
                .queues
                .get(tier)
                .iter()
                .filter(|th| now.saturating_sub(th.ready_tick) >= threshold)
                .map(|th| th.tid)
                .collect();

            for tid in due {
                let Some(th) = self.queues.get_mut(tier).get_mut(tid) else {
                    continue;
                };
                let old = th.age(step, now);
                let new = th.priority;
                self.tracer
                    .emit(now, tid, tier, EventKind::PriorityChanged { old, new });
                self.check_and_move(now, tid, old);
            }
        }
    }
}
