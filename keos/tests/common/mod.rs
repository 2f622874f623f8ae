//! Boot helpers shared by the scheduler tests.
#![allow(dead_code)]

use keos_sched::{
    Kernel, SimulatedSwitch, SwitchRecord, SystemConfigurationBuilder,
    config::SchedulerConfig,
    thread::ThreadId,
    trace::{Event, EventKind, EventLog},
};
use std::{cell::RefCell, rc::Rc, sync::Arc};

pub struct Machine {
    pub kernel: Kernel,
    pub log: Arc<EventLog>,
    pub switches: Rc<RefCell<Vec<SwitchRecord>>>,
}

pub fn boot() -> Machine {
    boot_with(SchedulerConfig::default())
}

pub fn boot_with(config: SchedulerConfig) -> Machine {
    let _ = env_logger::builder().is_test(true).try_init();

    let log = Arc::new(EventLog::new());
    let switch = SimulatedSwitch::new();
    let switches = switch.history();
    let kernel = SystemConfigurationBuilder::new()
        .set_config(config)
        .set_switch(switch)
        .set_trace_sink(log.clone())
        .boot()
        .expect("Default configuration must boot.");
    Machine {
        kernel,
        log,
        switches,
    }
}

/// Events about `tid`, in order.
pub fn events_of(events: &[Event], tid: ThreadId) -> Vec<Event> {
    events.iter().copied().filter(|e| e.tid == tid).collect()
}

/// Threads that got the processor, in order.
pub fn selections(events: &[Event]) -> Vec<ThreadId> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Selected)
        .map(|e| e.tid)
        .collect()
}
