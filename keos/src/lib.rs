//! # KeOS: three-level feedback queue scheduler
//!
//! This crate is the scheduler and dispatcher of KeOS running on a single
//! CPU. It decides which thread owns the processor, and it performs the
//! handoff of the processor from one thread to another.
//!
//! ## Scheduling policy
//!
//! Runnable threads wait in one of three ready queues, chosen by their
//! priority:
//!
//! | Queue | Priority    | Order                                  |
//! |-------|-------------|----------------------------------------|
//! | L1    | `>= 100`    | shortest predicted CPU burst first     |
//! | L2    | `50 ..= 99` | highest priority first                 |
//! | L3    | `< 50`      | first-in-first-out (round robin)       |
//!
//! L1 always drains before L2, and L2 before L3. A thread that waits in a
//! ready queue for 1500 ticks gains 10 priority points ([`aging`]), which may
//! move it to a higher queue. The burst of a thread is predicted with an
//! exponential average of the ticks it actually ran ([`dispatch`]). A thread
//! entering L1 with a shorter predicted burst than the running thread
//! requests a preemption ([`preempt`]).
//!
//! ## Mutual exclusion
//!
//! The scheduler takes no locks. Waiting for a lock would require the
//! scheduler itself to pick another thread, so every scheduling operation
//! instead takes an [`InterruptGuard`] as a proof that interrupts are off.
//! On a uniprocessor nothing else can run while the guard is alive.
//!
//! ## Crate layout
//!
//! - [`thread`]: the thread control record and its lifecycle.
//! - [`thread::queue`], [`thread::scheduler`], [`aging`], [`preempt`]: the
//!   policy.
//! - [`dispatch`]: the context-switch choreography.
//! - [`kernel`]: a small kernel facade that threads, parks, exits and ticks.
//! - [`trace`]: the scheduling events used to reconstruct what happened.
//!
//! [`InterruptGuard`]: abyss::interrupt::InterruptGuard
//! [`aging`]: thread::aging
//! [`preempt`]: thread::preempt
//! [`dispatch`]: thread::dispatch
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

#[macro_use]
extern crate abyss;
extern crate alloc;

pub mod config;
pub mod kernel;
pub mod task;
pub mod thread;
pub mod trace;

pub use abyss::{
    context::{Context, ContextSwitch, SimulatedSwitch, SwitchRecord},
    interrupt::{Interrupt, InterruptGuard, InterruptState, Ticks},
};
pub use kernel::Kernel;

use alloc::{boxed::Box, sync::Arc};
use config::SchedulerConfig;
use trace::{NullSink, TraceSink};

/// Enum representing errors that can occur during a kernel operation.
///
/// Only misuse of the kernel facade is reported through this type. A broken
/// scheduler invariant is a kernel bug and panics instead.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum KernelError {
    /// Operation is not permitted. (EPERM)
    OperationNotPermitted,
    /// No such thread. (ESRCH)
    NoSuchEntry,
    /// Invalid arguement. (EINVAL)
    InvalidArgument,
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            KernelError::OperationNotPermitted => write!(f, "operation not permitted"),
            KernelError::NoSuchEntry => write!(f, "no such thread"),
            KernelError::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

/// A builder for system configuration settings.
///
/// The [`SystemConfigurationBuilder`] struct collects the scheduling
/// parameters and the pieces of the machine the scheduler is wired to
/// before the kernel boots.
pub struct SystemConfigurationBuilder {
    config: SchedulerConfig,
    switcher: Option<Box<dyn ContextSwitch>>,
    sink: Option<Arc<dyn TraceSink>>,
}

impl Default for SystemConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemConfigurationBuilder {
    /// Starts from the default [`SchedulerConfig`], a [`SimulatedSwitch`] and
    /// a sink that drops every event.
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            switcher: None,
            sink: None,
        }
    }

    /// Sets the scheduling parameters.
    pub fn set_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the context-switch primitive of the machine.
    pub fn set_switch(mut self, switcher: impl ContextSwitch + 'static) -> Self {
        self.switcher = Some(Box::new(switcher));
        self
    }

    /// Sets where scheduling events are recorded.
    pub fn set_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validates the configuration and boots the kernel.
    ///
    /// The booting context becomes the idle thread; spawned threads take
    /// over the processor at the first reschedule.
    pub fn boot(self) -> Result<Kernel, KernelError> {
        let Self {
            config,
            switcher,
            sink,
        } = self;
        config.validate()?;
        info!(
            "Scheduler: aging +{} every {} ticks, L1 >= {}, L2 >= {}, L2 ordered by {:?}.",
            config.aging_step,
            config.aging_threshold,
            config.l1_floor,
            config.l2_floor,
            config.l2_order
        );
        Ok(Kernel::new(
            config,
            switcher.unwrap_or_else(|| Box::new(SimulatedSwitch::new())),
            sink.unwrap_or_else(|| Arc::new(NullSink)),
        ))
    }
}
