//! Scheduling trace.
//!
//! Every externally visible scheduling decision produces an [`Event`]. The
//! events are enough to replay which thread entered or left which queue, and
//! when the processor changed hands. They go to a [`TraceSink`] chosen at
//! boot, and are echoed to the kernel log one line per event.
use crate::thread::{ThreadId, queue::Tier};
use abyss::interrupt::Ticks;
use alloc::{sync::Arc, vec::Vec};
use core::fmt;
use crossbeam_queue::SegQueue;

bitflags::bitflags! {
    /// A set of [`EventKind`]s.
    pub struct EventMask: u8 {
        /// [`EventKind::Inserted`].
        const INSERTED = 1 << 0;
        /// [`EventKind::Removed`].
        const REMOVED = 1 << 1;
        /// [`EventKind::Selected`].
        const SELECTED = 1 << 2;
        /// [`EventKind::Replaced`].
        const REPLACED = 1 << 3;
        /// [`EventKind::PriorityChanged`].
        const PRIORITY_CHANGED = 1 << 4;
    }
}

/// What happened to a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The thread entered a ready queue.
    Inserted,
    /// The thread left a ready queue.
    Removed,
    /// The thread got the processor.
    Selected,
    /// The thread gave up the processor after running `executed` ticks.
    Replaced {
        /// Ticks spent on the processor.
        executed: Ticks,
    },
    /// Aging raised the priority of the thread.
    PriorityChanged {
        /// Priority before aging.
        old: u32,
        /// Priority after aging.
        new: u32,
    },
}

impl EventKind {
    /// The mask bit of this kind.
    pub fn mask(&self) -> EventMask {
        match self {
            EventKind::Inserted => EventMask::INSERTED,
            EventKind::Removed => EventMask::REMOVED,
            EventKind::Selected => EventMask::SELECTED,
            EventKind::Replaced { .. } => EventMask::REPLACED,
            EventKind::PriorityChanged { .. } => EventMask::PRIORITY_CHANGED,
        }
    }
}

/// A scheduling event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Tick at which the event happened.
    pub tick: Ticks,
    /// The thread the event is about.
    pub tid: ThreadId,
    /// The queue involved, or the queue the thread's priority maps to.
    pub tier: Tier,
    /// What happened.
    pub kind: EventKind,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tick {}: Thread {} ", self.tick, self.tid)?;
        match self.kind {
            EventKind::Inserted => write!(f, "is inserted into queue {}", self.tier),
            EventKind::Removed => write!(f, "is removed from queue {}", self.tier),
            EventKind::Selected => write!(f, "is now selected for execution"),
            EventKind::Replaced { executed } => {
                write!(f, "is replaced, and it has executed {} ticks", executed)
            }
            EventKind::PriorityChanged { old, new } => {
                write!(f, "changes its priority from {} to {}", old, new)
            }
        }
    }
}

/// A destination for scheduling events.
///
/// Sinks are called with interrupts disabled and must not block.
pub trait TraceSink {
    /// Records `event`.
    fn record(&self, event: Event);
}

/// A sink that discards every event.
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _event: Event) {}
}

/// A sink that keeps events in memory until they are drained.
#[derive(Default)]
pub struct EventLog {
    events: SegQueue<Event>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every recorded event, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            out.push(event);
        }
        out
    }

    /// Number of events waiting to be drained.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event is waiting to be drained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl TraceSink for EventLog {
    fn record(&self, event: Event) {
        self.events.push(event);
    }
}

/// Filters events by kind and forwards them to the sink.
#[derive(Clone)]
pub struct Tracer {
    sink: Arc<dyn TraceSink>,
    mask: EventMask,
    echo: bool,
}

impl Tracer {
    /// Creates a tracer forwarding the kinds in `mask` to `sink`.
    pub fn new(sink: Arc<dyn TraceSink>, mask: EventMask, echo: bool) -> Self {
        Self { sink, mask, echo }
    }

    pub(crate) fn emit(&self, tick: Ticks, tid: ThreadId, tier: Tier, kind: EventKind) {
        if !self.mask.contains(kind.mask()) {
            return;
        }
        let event = Event {
            tick,
            tid,
            tier,
            kind,
        };
        if self.echo {
            info!("{}", event);
        }
        self.sink.record(event);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn log_lines() {
        let event = |kind| Event {
            tick: 1500,
            tid: 3,
            tier: Tier::L2,
            kind,
        };
        assert_eq!(
            event(EventKind::Inserted).to_string(),
            "Tick 1500: Thread 3 is inserted into queue L2"
        );
        assert_eq!(
            event(EventKind::Removed).to_string(),
            "Tick 1500: Thread 3 is removed from queue L2"
        );
        assert_eq!(
            event(EventKind::Selected).to_string(),
            "Tick 1500: Thread 3 is now selected for execution"
        );
        assert_eq!(
            event(EventKind::Replaced { executed: 42 }).to_string(),
            "Tick 1500: Thread 3 is replaced, and it has executed 42 ticks"
        );
        assert_eq!(
            event(EventKind::PriorityChanged { old: 70, new: 80 }).to_string(),
            "Tick 1500: Thread 3 changes its priority from 70 to 80"
        );
    }

    #[test]
    fn mask_filters_kinds() {
        let log = Arc::new(EventLog::new());
        let tracer = Tracer::new(
            log.clone(),
            EventMask::INSERTED | EventMask::REMOVED,
            false,
        );
        tracer.emit(1, 1, Tier::L3, EventKind::Inserted);
        tracer.emit(2, 1, Tier::L3, EventKind::Selected);
        tracer.emit(3, 1, Tier::L3, EventKind::Removed);

        let kinds: Vec<_> = log.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [EventKind::Inserted, EventKind::Removed]);
        assert!(log.is_empty());
    }
}
