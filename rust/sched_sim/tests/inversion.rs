//! Priority inversion and the two protocols that bound it.
//!
//! `low` takes R0 at once; `high` arrives a tick later and wants R0 at
//! once; `med` arrives after that and never touches R0.

use sched_sim::*;

mod common;

const LOW: Pid = Pid(1);
const HIGH: Pid = Pid(2);
const MED: Pid = Pid(3);

fn inversion() -> Scenario {
    Scenario::builder()
        .process(ProcessDef::new(LOW, "low", 6, 1).hold(0, 0, 4))
        .process(ProcessDef::new(HIGH, "high", 2, 10).start(1).hold(0, 0, 1))
        .process(ProcessDef::new(MED, "med", 3, 5).start(2))
        .build()
}

/// Without a protocol, `med` runs while `high` waits on `low`.
#[test]
fn test_plain_priority_inverts() {
    common::setup_test();
    let trace = Simulator::new(Strategy::Priority).run(inversion());
    trace.dump();

    assert_eq!(trace.exit_kind(), &ExitKind::Normal);
    assert_eq!(trace.exit_order(), vec![MED, HIGH, LOW]);
    assert_eq!(trace.run_order()[2..5], [MED, MED, MED]);
    assert!(trace.prio_changes(LOW).is_empty());
}

/// Under the ceiling protocol the holder runs at the ceiling until it
/// releases, so neither `high` nor `med` gets in.
#[test]
fn test_pcp_holder_not_preempted() {
    common::setup_test();
    let trace = Simulator::new(Strategy::PriorityCeiling).run(inversion());
    trace.dump();

    assert_eq!(trace.exit_kind(), &ExitKind::Normal);
    for tick in 0..4 {
        assert_eq!(trace.ran_at(tick), Some(LOW), "tick {tick}");
    }
    assert_eq!(trace.prio_changes(LOW), vec![(0, 1, MAX_PRIO), (3, MAX_PRIO, 1)]);
    assert_eq!(trace.exit_order(), vec![HIGH, MED, LOW]);

    // high never had to wait for R0.
    assert_eq!(trace.summary().blocks, 0);
}

/// Under inheritance the holder borrows `high`'s priority while `high`
/// waits, then drops back to exactly its base priority.
#[test]
fn test_pip_raises_and_restores() {
    common::setup_test();
    let trace = Simulator::new(Strategy::PriorityInheritance).run(inversion());
    trace.dump();

    assert_eq!(trace.exit_kind(), &ExitKind::Normal);
    assert_eq!(trace.prio_changes(LOW), vec![(1, 1, 10), (3, 10, 1)]);
    assert_eq!(trace.exit_order(), vec![HIGH, MED, LOW]);

    // med never runs while high is blocked.
    for tick in 1..4 {
        assert_ne!(trace.ran_at(tick), Some(MED), "tick {tick}");
    }
    assert_eq!(common::woke_order(&trace, ResourceId(0)), vec![HIGH]);
}

/// Inheritance leaves the owner alone when the waiter does not outrank it.
#[test]
fn test_pip_no_raise_for_equal_waiter() {
    common::setup_test();
    let scenario = Scenario::builder()
        .process(ProcessDef::new(Pid(1), "owner", 4, 5).hold(0, 0, 3))
        .process(ProcessDef::new(Pid(2), "waiter", 1, 5).start(1).hold(0, 0, 1))
        .build();

    let trace = Simulator::new(Strategy::PriorityInheritance).run(scenario);

    assert_eq!(trace.summary().blocks, 1);
    assert!(trace.prio_changes(Pid(1)).is_empty());
    assert_eq!(trace.run_order(), vec![Pid(1), Pid(1), Pid(1), Pid(2), Pid(1)]);
}
