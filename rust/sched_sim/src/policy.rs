//! Scheduling policies.
//!
//! Every policy makes its per-tick decision in two phases:
//!
//! 1. **Retire**: decide what happens to the current process. A process
//!    that blocked, terminated or used up its lifespan is left alone.
//!    Otherwise non-preemptive policies keep it running and preemptive
//!    ones put it back at the ready-queue tail.
//! 2. **Pick**: select the next process from the ready queue by the
//!    policy's key, ties going to the earliest-queued process.
//!
//! Policies only talk to the rest of the system through [`SimContext`].

use tracing::debug;

use crate::context::SimContext;
use crate::process::ProcessStatus;
use crate::types::Pid;

/// The per-tick scheduling decision functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedPolicy {
    /// First come, first served. Runs each process to completion.
    Fifo,
    /// Shortest job first by total lifespan. Non-preemptive.
    Sjf,
    /// Shortest remaining time first. Re-decided every tick.
    Srtf,
    /// Round-robin with a one-tick quantum.
    RoundRobin,
    /// Highest effective priority first. Re-decided every tick.
    Priority,
    /// Priority with aging of every process left waiting in the ready queue.
    PriorityAging,
}

/// What the retire phase does with a current process that still has work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retire {
    Keep,
    Requeue,
    /// Drop any aging boost, then requeue.
    ResetAndRequeue,
}

impl SchedPolicy {
    pub fn name(self) -> &'static str {
        match self {
            SchedPolicy::Fifo => "FIFO",
            SchedPolicy::Sjf => "SJF",
            SchedPolicy::Srtf => "SRTF",
            SchedPolicy::RoundRobin => "RR",
            SchedPolicy::Priority => "Priority",
            SchedPolicy::PriorityAging => "Priority+Aging",
        }
    }

    /// Whether the policy can take the CPU away from a process that still
    /// has work left.
    pub fn is_preemptive(self) -> bool {
        self.retire_mode() != Retire::Keep
    }

    fn retire_mode(self) -> Retire {
        match self {
            SchedPolicy::Fifo | SchedPolicy::Sjf => Retire::Keep,
            SchedPolicy::Srtf | SchedPolicy::RoundRobin | SchedPolicy::Priority => {
                Retire::Requeue
            }
            SchedPolicy::PriorityAging => Retire::ResetAndRequeue,
        }
    }

    /// Choose the process to run this tick.
    ///
    /// Updates the ready queue and `ctx.current`; the returned process is
    /// `Running`. Returns `None` when nothing is runnable.
    pub fn schedule(self, ctx: &mut SimContext) -> Option<Pid> {
        if let Some(pid) = self.retire(ctx) {
            return Some(pid);
        }
        let next = self.pick(ctx);
        ctx.current = next;
        next
    }

    /// Returns the current process when it keeps the CPU.
    fn retire(self, ctx: &mut SimContext) -> Option<Pid> {
        let cur = ctx.current?;
        let p = ctx.process(cur);
        if p.status != ProcessStatus::Running || p.is_done() {
            return None;
        }

        match self.retire_mode() {
            Retire::Keep => return Some(cur),
            Retire::Requeue => {}
            Retire::ResetAndRequeue => {
                let p = ctx.process_mut(cur);
                p.prio = p.prio_orig;
            }
        }
        ctx.make_ready(cur);
        None
    }

    fn pick(self, ctx: &mut SimContext) -> Option<Pid> {
        let next = match self {
            SchedPolicy::Fifo | SchedPolicy::RoundRobin => ctx.ready.front(),
            SchedPolicy::Sjf => ctx
                .ready
                .first_min_by_key(|pid| ctx.process(pid).lifespan),
            SchedPolicy::Srtf => ctx
                .ready
                .first_min_by_key(|pid| ctx.process(pid).remaining()),
            SchedPolicy::Priority => ctx.ready.first_max_by_key(|pid| ctx.process(pid).prio),
            SchedPolicy::PriorityAging => {
                age_ready(ctx);
                ctx.ready.first_max_by_key(|pid| ctx.process(pid).prio)
            }
        }?;

        ctx.ready.remove(next);
        let p = ctx.process_mut(next);
        assert!(
            p.status == ProcessStatus::Ready,
            "picked process {next} is {:?}, not Ready",
            p.status
        );
        p.status = ProcessStatus::Running;
        debug!(
            pid = next.0,
            prio = p.prio,
            remaining = p.remaining(),
            policy = self.name(),
            "pick"
        );
        Some(next)
    }
}

/// Bump the priority of every ready process by one, up to the aging cap.
/// Processes already at or above the cap keep their priority.
fn age_ready(ctx: &mut SimContext) {
    let cap = ctx.limits.aging_cap;
    for pid in ctx.ready.pids() {
        let p = ctx.process_mut(pid);
        if p.prio < cap {
            p.prio += 1;
        }
    }
}
