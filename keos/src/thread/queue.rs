//! Ready queues.
//!
//! A [`ReadyQueue`] keeps its threads sorted by its [`QueueOrder`] at all
//! times, so selection is always a pop from the front. Insertion places a
//! thread after every thread that compares equal to it, which keeps equal
//! keys in arrival order.
use super::{Thread, ThreadId};
use alloc::{boxed::Box, collections::VecDeque, vec::Vec};
use core::fmt;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// One of the three ready queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Tier {
    /// Shortest predicted burst first.
    L1 = 1,
    /// Highest priority first.
    L2 = 2,
    /// Round robin.
    L3 = 3,
}

impl Tier {
    /// Every tier, from the most to the least important.
    pub const ALL: [Tier; 3] = [Tier::L1, Tier::L2, Tier::L3];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", u8::from(*self))
    }
}

/// The key a [`ReadyQueue`] is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrder {
    /// Smaller [`Thread::burst_estimate`] first.
    ShortestBurst,
    /// Larger [`Thread::priority`] first.
    HighestPriority,
    /// Arrival order.
    Arrival,
}

impl QueueOrder {
    /// Whether `th` must be placed before `other`.
    fn precedes(&self, th: &Thread, other: &Thread) -> bool {
        match self {
            QueueOrder::ShortestBurst => th.burst < other.burst,
            QueueOrder::HighestPriority => th.priority > other.priority,
            QueueOrder::Arrival => false,
        }
    }
}

/// A sorted queue of runnable threads.
pub struct ReadyQueue {
    order: QueueOrder,
    threads: VecDeque<Box<Thread>>,
}

impl ReadyQueue {
    /// Creates an empty queue sorted by `order`.
    pub fn new(order: QueueOrder) -> Self {
        Self {
            order,
            threads: VecDeque::new(),
        }
    }

    /// The key this queue is sorted by.
    pub fn order(&self) -> QueueOrder {
        self.order
    }

    pub(crate) fn insert(&mut self, th: Box<Thread>) {
        let pos = self
            .threads
            .iter()
            .position(|other| self.order.precedes(&th, other))
            .unwrap_or(self.threads.len());
        self.threads.insert(pos, th);
    }

    pub(crate) fn remove(&mut self, tid: ThreadId) -> Option<Box<Thread>> {
        let pos = self.threads.iter().position(|th| th.tid == tid)?;
        self.threads.remove(pos)
    }

    pub(crate) fn pop_front(&mut self) -> Option<Box<Thread>> {
        self.threads.pop_front()
    }

    pub(crate) fn get_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.threads
            .iter_mut()
            .find(|th| th.tid == tid)
            .map(|th| th.as_mut())
    }

    /// Looks up a queued thread.
    pub fn get(&self, tid: ThreadId) -> Option<&Thread> {
        self.threads
            .iter()
            .find(|th| th.tid == tid)
            .map(|th| th.as_ref())
    }

    /// Iterates the queue from the front.
    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter().map(|th| th.as_ref())
    }

    /// Thread ids from the front to the back.
    pub fn tids(&self) -> Vec<ThreadId> {
        self.iter().map(|th| th.tid).collect()
    }

    /// Number of queued threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Whether no thread is queued.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

/// The three ready queues.
pub struct ReadyQueues {
    l1: ReadyQueue,
    l2: ReadyQueue,
    l3: ReadyQueue,
}

impl ReadyQueues {
    /// Creates empty queues; L2 is sorted by `l2`.
    pub fn new(l2: QueueOrder) -> Self {
        Self {
            l1: ReadyQueue::new(QueueOrder::ShortestBurst),
            l2: ReadyQueue::new(l2),
            l3: ReadyQueue::new(QueueOrder::Arrival),
        }
    }

    /// The queue of `tier`.
    pub fn get(&self, tier: Tier) -> &ReadyQueue {
        match tier {
            Tier::L1 => &self.l1,
            Tier::L2 => &self.l2,
            Tier::L3 => &self.l3,
        }
    }

    pub(crate) fn get_mut(&mut self, tier: Tier) -> &mut ReadyQueue {
        match tier {
            Tier::L1 => &mut self.l1,
            Tier::L2 => &mut self.l2,
            Tier::L3 => &mut self.l3,
        }
    }

    /// The queue `tid` currently waits in.
    pub fn find(&self, tid: ThreadId) -> Option<Tier> {
        Tier::ALL
            .into_iter()
            .find(|tier| self.get(*tier).get(tid).is_some())
    }

    /// Number of threads over all queues.
    pub fn len(&self) -> usize {
        self.l1.len() + self.l2.len() + self.l3.len()
    }

    /// Whether every queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::thread::ThreadBuilder;

    fn thread(priority: u32, burst: f64) -> Box<Thread> {
        ThreadBuilder::new("q")
            .priority(priority)
            .initial_burst(burst)
            .into_thread()
    }

    #[test]
    fn tier_numbering() {
        assert_eq!(u8::from(Tier::L2), 2);
        assert_eq!(Tier::try_from(3).ok(), Some(Tier::L3));
        assert!(Tier::try_from(4).is_err());
        assert_eq!(alloc::format!("{}", Tier::L1), "L1");
    }

    #[test]
    fn shortest_burst_with_stable_ties() {
        let mut q = ReadyQueue::new(QueueOrder::ShortestBurst);
        let (a, b, c, d) = (thread(100, 8.0), thread(100, 3.0), thread(100, 8.0), thread(100, 5.0));
        let order = [b.tid, d.tid, a.tid, c.tid];
        for th in [a, b, c, d] {
            q.insert(th);
        }
        assert_eq!(q.tids(), order);
    }

    #[test]
    fn highest_priority_with_stable_ties() {
        let mut q = ReadyQueue::new(QueueOrder::HighestPriority);
        let (a, b, c) = (thread(60, 0.0), thread(90, 0.0), thread(60, 0.0));
        let order = [b.tid, a.tid, c.tid];
        for th in [a, b, c] {
            q.insert(th);
        }
        assert_eq!(q.tids(), order);
    }

    #[test]
    fn arrival_ignores_keys() {
        let mut q = ReadyQueue::new(QueueOrder::Arrival);
        let (a, b) = (thread(10, 9.0), thread(40, 1.0));
        let order = [a.tid, b.tid];
        q.insert(a);
        q.insert(b);
        assert_eq!(q.tids(), order);
        assert_eq!(q.pop_front().map(|th| th.tid), Some(order[0]));
    }

    #[test]
    fn remove_by_tid() {
        let mut qs = ReadyQueues::new(QueueOrder::HighestPriority);
        let th = thread(70, 0.0);
        let tid = th.tid;
        qs.get_mut(Tier::L2).insert(th);
        assert_eq!(qs.find(tid), Some(Tier::L2));
        assert_eq!(qs.len(), 1);
        assert!(qs.get_mut(Tier::L3).remove(tid).is_none());
        assert!(qs.get_mut(Tier::L2).remove(tid).is_some());
        assert!(qs.is_empty());
        assert_eq!(qs.find(tid), None);
    }
}
