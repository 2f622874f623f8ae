//! Scheduler configuration.
//!
//! The defaults reproduce the classic three-level policy. The kernel command
//! line may override them and lists the programs to start at boot:
//!
//! ```text
//! -ep <program> <priority>   start <program> with the given priority
//! -aging <ticks>             waiting time that triggers aging
//! -age-step <n>              priority points granted per aging event
//! -l2 priority|arrival       ordering of the L2 queue
//! -quiet                     do not echo scheduling events to the log
//! ```
use crate::{KernelError, thread::queue::Tier, trace::EventMask};
use abyss::interrupt::Ticks;
use alloc::{
    string::{String, ToString},
    vec::Vec,
};

/// Ticks a thread may wait in a ready queue before it is aged.
pub const AGING_THRESHOLD: Ticks = 1500;
/// Priority points granted by one aging event.
pub const AGING_STEP: u32 = 10;
/// Lowest priority served by the L1 queue.
pub const L1_FLOOR: u32 = 100;
/// Lowest priority served by the L2 queue.
pub const L2_FLOOR: u32 = 50;
/// Delay of the timer interrupt that carries a preemption request.
pub const PREEMPT_DELAY: Ticks = 1;

/// How threads of equal tier are ordered inside L2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L2Order {
    /// Higher priority first, equal priorities in arrival order.
    Priority,
    /// Arrival order only.
    Arrival,
}

/// Tunables of the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// See [`AGING_THRESHOLD`].
    pub aging_threshold: Ticks,
    /// See [`AGING_STEP`].
    pub aging_step: u32,
    /// See [`L1_FLOOR`].
    pub l1_floor: u32,
    /// See [`L2_FLOOR`].
    pub l2_floor: u32,
    /// See [`PREEMPT_DELAY`].
    pub preempt_delay: Ticks,
    /// Ordering of the L2 queue.
    pub l2_order: L2Order,
    /// Event kinds that are recorded.
    pub trace: EventMask,
    /// Whether recorded events are also written to the kernel log.
    pub echo_events: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            aging_threshold: AGING_THRESHOLD,
            aging_step: AGING_STEP,
            l1_floor: L1_FLOOR,
            l2_floor: L2_FLOOR,
            preempt_delay: PREEMPT_DELAY,
            l2_order: L2Order::Priority,
            trace: EventMask::all(),
            echo_events: true,
        }
    }
}

impl SchedulerConfig {
    /// Checks that the tunables describe a usable policy.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.l2_floor >= self.l1_floor
            || self.aging_threshold == 0
            || self.aging_step == 0
            || self.preempt_delay == 0
        {
            warning!("Rejecting scheduler configuration: {:?}", self);
            return Err(KernelError::InvalidArgument);
        }
        Ok(())
    }

    /// The queue that serves `priority`.
    pub fn tier_of(&self, priority: u32) -> Tier {
        if priority >= self.l1_floor {
            Tier::L1
        } else if priority >= self.l2_floor {
            Tier::L2
        } else {
            Tier::L3
        }
    }
}

/// A program to start at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Name of the program.
    pub name: String,
    /// Initial priority of its thread.
    pub priority: u32,
}

/// A parsed kernel command line.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommandLine {
    /// Programs given with `-ep`, in order.
    pub programs: Vec<Program>,
    aging_threshold: Option<Ticks>,
    aging_step: Option<u32>,
    l2_order: Option<L2Order>,
    quiet: bool,
}

impl CommandLine {
    /// Parses a whitespace separated command line.
    pub fn parse(cmd: &str) -> Result<Self, KernelError> {
        fn number<T: core::str::FromStr>(arg: Option<&str>) -> Result<T, KernelError> {
            arg.and_then(|arg| arg.parse().ok())
                .ok_or(KernelError::InvalidArgument)
        }

        let mut parsed = Self::default();
        let mut args = cmd.split_whitespace();
        while let Some(flag) = args.next() {
            match flag {
                "-ep" => {
                    let name = args.next().ok_or(KernelError::InvalidArgument)?;
                    let priority = number(args.next())?;
                    parsed.programs.push(Program {
                        name: name.to_string(),
                        priority,
                    });
                }
                "-aging" => parsed.aging_threshold = Some(number(args.next())?),
                "-age-step" => parsed.aging_step = Some(number(args.next())?),
                "-l2" => {
                    parsed.l2_order = Some(match args.next() {
                        Some("priority") => L2Order::Priority,
                        Some("arrival") => L2Order::Arrival,
                        _ => return Err(KernelError::InvalidArgument),
                    })
                }
                "-quiet" => parsed.quiet = true,
                _ => {
                    warning!("Unknown command line option: {}", flag);
                    return Err(KernelError::InvalidArgument);
                }
            }
        }
        Ok(parsed)
    }

    /// Overrides the parts of `config` given on the command line.
    pub fn apply(&self, config: &mut SchedulerConfig) {
        if let Some(ticks) = self.aging_threshold {
            config.aging_threshold = ticks;
        }
        if let Some(step) = self.aging_step {
            config.aging_step = step;
        }
        if let Some(order) = self.l2_order {
            config.l2_order = order;
        }
        if self.quiet {
            config.echo_events = false;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tier_boundaries() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tier_of(149), Tier::L1);
        assert_eq!(config.tier_of(100), Tier::L1);
        assert_eq!(config.tier_of(99), Tier::L2);
        assert_eq!(config.tier_of(50), Tier::L2);
        assert_eq!(config.tier_of(49), Tier::L3);
        assert_eq!(config.tier_of(0), Tier::L3);
    }

    #[test]
    fn parse_programs_and_tunables() {
        let cmd = CommandLine::parse("-ep hw1 120 -ep hw2 45 -aging 300 -l2 arrival -quiet")
            .unwrap();
        assert_eq!(
            cmd.programs,
            [
                Program {
                    name: "hw1".into(),
                    priority: 120
                },
                Program {
                    name: "hw2".into(),
                    priority: 45
                }
            ]
        );

        let mut config = SchedulerConfig::default();
        cmd.apply(&mut config);
        assert_eq!(config.aging_threshold, 300);
        assert_eq!(config.aging_step, AGING_STEP);
        assert_eq!(config.l2_order, L2Order::Arrival);
        assert!(!config.echo_events);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(
            CommandLine::parse("-ep hw1"),
            Err(KernelError::InvalidArgument)
        );
        assert_eq!(
            CommandLine::parse("-ep hw1 high"),
            Err(KernelError::InvalidArgument)
        );
        assert_eq!(
            CommandLine::parse("-l2 random"),
            Err(KernelError::InvalidArgument)
        );
        assert_eq!(
            CommandLine::parse("-rs 1234"),
            Err(KernelError::InvalidArgument)
        );
        assert_eq!(CommandLine::parse("   "), Ok(CommandLine::default()));
    }

    #[test]
    fn validate_rejects_overlapping_tiers() {
        let config = SchedulerConfig {
            l2_floor: 100,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.validate(), Err(KernelError::InvalidArgument));

        let config = SchedulerConfig {
            aging_step: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.validate(), Err(KernelError::InvalidArgument));
    }
}
