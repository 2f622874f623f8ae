mod common;

use common::{boot, boot_with, selections};
use keos_sched::{
    config::{L2Order, SchedulerConfig},
    thread::{ThreadBuilder, queue::Tier},
    trace::EventKind,
};

/// Tests that admission files every thread into the queue its priority
/// maps to.
///
/// This test ensures that:
/// - Priorities at the tier boundaries land in the right queue.
/// - Every admission is traced with the queue it entered.
#[test]
fn tier_by_priority() {
    let mut m = boot();
    let cases = [
        (149, Tier::L1),
        (100, Tier::L1),
        (99, Tier::L2),
        (50, Tier::L2),
        (49, Tier::L3),
        (0, Tier::L3),
    ];
    let tids: Vec<_> = cases
        .iter()
        .map(|(priority, _)| m.kernel.exec("t", *priority))
        .collect();

    for (tid, (_, tier)) in tids.iter().zip(cases) {
        assert_eq!(m.kernel.scheduler().tier_of(*tid), Some(tier));
    }
    let inserted: Vec<_> = m
        .log
        .drain()
        .into_iter()
        .map(|e| (e.tid, e.kind, e.tier))
        .collect();
    let expected: Vec<_> = tids
        .iter()
        .zip(cases)
        .map(|(tid, (_, tier))| (*tid, EventKind::Inserted, tier))
        .collect();
    assert_eq!(inserted, expected);
}

/// Tests that a higher queue always drains before a lower one.
///
/// This test ensures that:
/// - Threads are selected L1 first, then L2, then L3, regardless of arrival.
/// - The processor goes idle once every thread exited.
#[test]
fn tiers_drain_in_order() {
    let mut m = boot();
    let low = m.kernel.exec("low", 10);
    let mid = m.kernel.exec("mid", 60);
    let high = m.kernel.exec("high", 120);

    m.kernel.yield_now();
    for expected in [high, mid, low] {
        assert_eq!(m.kernel.current_tid(), Some(expected));
        m.kernel.exit(0).unwrap();
    }
    assert_eq!(m.kernel.current_tid(), None);
    assert!(m.kernel.dispatcher().is_idle());
    assert_eq!(selections(&m.log.drain()), [high, mid, low]);
}

/// Tests shortest-burst-first selection in L1.
///
/// This test ensures that:
/// - The thread with the smallest predicted burst runs first.
/// - Threads with equal bursts run in arrival order.
#[test]
fn l1_shortest_burst_first() {
    let mut m = boot();
    let a = ThreadBuilder::new("a").priority(100).initial_burst(8.0).spawn(&mut m.kernel);
    let b = ThreadBuilder::new("b").priority(140).initial_burst(3.0).spawn(&mut m.kernel);
    let c = ThreadBuilder::new("c").priority(110).initial_burst(8.0).spawn(&mut m.kernel);
    let d = ThreadBuilder::new("d").priority(100).initial_burst(5.0).spawn(&mut m.kernel);

    assert_eq!(m.kernel.scheduler().queue(Tier::L1).tids(), [b, d, a, c]);
    m.kernel.yield_now();
    for _ in 0..4 {
        m.kernel.exit(0).unwrap();
    }
    assert_eq!(selections(&m.log.drain()), [b, d, a, c]);
}

/// Tests that a burst prediction of zero is the shortest one.
///
/// This test ensures that:
/// - A zero burst thread goes ahead of every other L1 thread.
/// - A NaN burst prediction is refused before the thread can reach a queue.
#[test]
#[should_panic(expected = "Invalid burst prediction")]
fn l1_refuses_nan_burst() {
    let mut m = boot();
    let slow = ThreadBuilder::new("slow")
        .priority(120)
        .initial_burst(5.0)
        .spawn(&mut m.kernel);
    let zero = ThreadBuilder::new("zero")
        .priority(120)
        .initial_burst(0.0)
        .spawn(&mut m.kernel);
    assert_eq!(m.kernel.scheduler().queue(Tier::L1).tids(), [zero, slow]);

    ThreadBuilder::new("nan")
        .priority(120)
        .initial_burst(f64::NAN)
        .spawn(&mut m.kernel);
}

/// Tests the default L2 ordering.
///
/// This test ensures that:
/// - Higher priority runs first in L2.
/// - Equal priorities keep arrival order.
#[test]
fn l2_by_priority() {
    let mut m = boot();
    let a = m.kernel.exec("a", 60);
    let b = m.kernel.exec("b", 90);
    let c = m.kernel.exec("c", 60);
    assert_eq!(m.kernel.scheduler().queue(Tier::L2).tids(), [b, a, c]);
}

/// Tests the arrival ordering of L2.
///
/// This test ensures that:
/// - With `-l2 arrival`, L2 behaves as a FIFO.
#[test]
fn l2_by_arrival() {
    let mut m = boot_with(SchedulerConfig {
        l2_order: L2Order::Arrival,
        ..SchedulerConfig::default()
    });
    let a = m.kernel.exec("a", 60);
    let b = m.kernel.exec("b", 90);
    let c = m.kernel.exec("c", 70);
    assert_eq!(m.kernel.scheduler().queue(Tier::L2).tids(), [a, b, c]);
}

/// Tests round robin in L3.
///
/// This test ensures that:
/// - A yielding L3 thread goes to the back of L3.
/// - Priorities do not reorder L3.
#[test]
fn l3_round_robin() {
    let mut m = boot();
    let a = m.kernel.exec("a", 10);
    let b = m.kernel.exec("b", 40);
    let c = m.kernel.exec("c", 20);

    m.kernel.yield_now();
    for _ in 0..5 {
        m.kernel.run_for(2);
        m.kernel.yield_now();
    }
    assert_eq!(selections(&m.log.drain()), [a, b, c, a, b, c]);
}

/// Tests that yielding with nothing else ready keeps the running thread.
#[test]
fn lonely_yield() {
    let mut m = boot();
    let a = m.kernel.exec("a", 10);
    m.kernel.yield_now();
    let switches = m.switches.borrow().len();

    m.kernel.yield_now();
    assert_eq!(m.kernel.current_tid(), Some(a));
    assert_eq!(m.switches.borrow().len(), switches);
}
