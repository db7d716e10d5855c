//! Tick-driven simulation engine.
//!
//! The engine is the driver around the scheduling core: it admits
//! processes on their arrival tick, asks the strategy for a decision once
//! per tick, plays each process's scripted resource traffic through the
//! strategy's protocol, ages the running process and retires it when its
//! lifespan is used up.

use std::collections::{BTreeMap, VecDeque};

use tracing::{error, info};

use crate::context::SimContext;
use crate::fmt::set_sim_tick;
use crate::process::{ProcessDef, ProcessStatus};
use crate::scenario::Scenario;
use crate::strategy::Strategy;
use crate::trace::{Trace, TraceKind};
use crate::types::{Pid, Prio, ResourceId, Tick};

/// How a simulation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitKind {
    /// Every process ran to completion.
    Normal,
    /// The run hit `Scenario::max_ticks` with processes still live.
    TickLimit { ticks: Tick },
    /// `Scenario::validate` rejected the scenario; nothing ran.
    InvalidScenario(String),
    /// The strategy's `initialize` hook failed; nothing ran.
    InitFailed(String),
    /// The per-tick audit found a broken queue or ownership invariant.
    InvariantViolation(String),
}

impl ExitKind {
    pub fn is_error(&self) -> bool {
        !matches!(self, ExitKind::Normal)
    }
}

/// The main simulator.
pub struct Simulator {
    strategy: Strategy,
}

impl Simulator {
    pub fn new(strategy: Strategy) -> Self {
        Simulator { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Run a scenario and return the trace.
    pub fn run(&self, scenario: Scenario) -> Trace {
        let mut trace = Trace::new(&scenario.processes);

        if let Err(e) = scenario.validate() {
            error!(%e, "invalid scenario");
            trace.finish(0, ExitKind::InvalidScenario(e.to_string()));
            return trace;
        }

        let mut ctx = SimContext::new(scenario.nr_resources, scenario.limits);
        if let Err(e) = self.strategy.initialize(&ctx) {
            error!(error = %format!("{e:#}"), "strategy initialization failed");
            trace.finish(0, ExitKind::InitFailed(format!("{e:#}")));
            return trace;
        }

        // Admission order: arrival tick, then definition order.
        let mut pending: Vec<ProcessDef> = scenario.processes;
        pending.sort_by_key(|d| d.start);
        let mut pending: VecDeque<ProcessDef> = pending.into();

        info!(
            strategy = self.strategy.name(),
            processes = pending.len(),
            resources = scenario.nr_resources,
            "simulation start"
        );

        let exit = loop {
            let tick = ctx.ticks();
            set_sim_tick(Some(tick));
            if tick >= scenario.max_ticks {
                break ExitKind::TickLimit { ticks: tick };
            }

            while pending.front().is_some_and(|d| d.start <= tick) {
                let Some(def) = pending.pop_front() else {
                    break;
                };
                let pid = ctx.admit(&def);
                info!(pid = pid.0, name = %def.name, lifespan = def.lifespan, prio = def.prio, "fork");
                trace.record(tick, TraceKind::Forked { pid });
            }

            let prios_before = snapshot_prios(&ctx);
            let busy = self.run_tick(&mut ctx, &mut trace);
            if !busy {
                if pending.is_empty() && ctx.nr_live() == 0 {
                    break ExitKind::Normal;
                }
                trace.record(tick, TraceKind::Idle);
            }
            record_prio_changes(&ctx, &prios_before, tick, &mut trace);

            if scenario.audit {
                if let Some(exit) = audit_tick(&ctx) {
                    break exit;
                }
            }

            ctx.advance_tick();
        };

        self.strategy.finalize(&ctx);
        info!(exit = ?exit, ticks = ctx.ticks(), "simulation end");
        trace.finish(ctx.ticks(), exit);
        set_sim_tick(None);
        trace
    }

    /// Play one tick. Returns false if nothing was runnable.
    fn run_tick(&self, ctx: &mut SimContext, trace: &mut Trace) -> bool {
        let tick = ctx.ticks();
        loop {
            let prev = ctx.current;
            let next = self.strategy.schedule(ctx);
            if next != prev {
                trace.record(tick, TraceKind::Switched { prev, next });
            }
            let Some(pid) = next else {
                return false;
            };

            // A process that blocks gives up the rest of this tick; pick
            // again. Each retry parks one more process, so this ends.
            if !self.acquire_due(ctx, trace, pid) {
                continue;
            }

            let p = ctx.process_mut(pid);
            p.age += 1;
            let age = p.age;
            trace.record(tick, TraceKind::Ran { pid, age });

            let due: Vec<ResourceId> = ctx.process(pid).releases_due().collect();
            for resource in due {
                self.release(ctx, trace, pid, resource);
            }

            if ctx.process(pid).is_done() {
                ctx.process_mut(pid).status = ProcessStatus::Terminated;
                info!(pid = pid.0, "exit");
                trace.record(tick, TraceKind::Exited { pid });
            }
            return true;
        }
    }

    /// Request every resource due at the current age. Returns false if the
    /// process blocked.
    fn acquire_due(&self, ctx: &mut SimContext, trace: &mut Trace, pid: Pid) -> bool {
        let tick = ctx.ticks();
        let due: Vec<ResourceId> = ctx
            .process(pid)
            .acquires_due()
            .filter(|&r| ctx.resources.owner(r) != Some(pid))
            .collect();
        for resource in due {
            if self.strategy.acquire(ctx, resource) {
                trace.record(tick, TraceKind::Acquired { pid, resource });
            } else {
                trace.record(tick, TraceKind::Blocked { pid, resource });
                return false;
            }
        }
        true
    }

    fn release(&self, ctx: &mut SimContext, trace: &mut Trace, pid: Pid, resource: ResourceId) {
        let tick = ctx.ticks();
        let waiters = ctx
            .resources
            .get(resource)
            .map(|r| r.waitqueue.pids())
            .unwrap_or_default();

        self.strategy.release(ctx, resource);
        trace.record(tick, TraceKind::Released { pid, resource });

        let still_waiting = ctx.resources.get(resource).map(|r| &r.waitqueue);
        if let Some(woken) = waiters
            .into_iter()
            .find(|&w| !still_waiting.is_some_and(|q| q.contains(w)))
        {
            trace.record(tick, TraceKind::Woke { pid: woken, resource });
        }
    }
}

/// End-of-tick invariant check. Returns the exit to take if it failed.
fn audit_tick(ctx: &SimContext) -> Option<ExitKind> {
    let v = ctx.audit().err()?;
    error!(%v, "invariant violated");
    Some(ExitKind::InvariantViolation(v.to_string()))
}

fn snapshot_prios(ctx: &SimContext) -> BTreeMap<Pid, Prio> {
    ctx.processes.values().map(|p| (p.pid, p.prio)).collect()
}

fn record_prio_changes(
    ctx: &SimContext,
    before: &BTreeMap<Pid, Prio>,
    tick: Tick,
    trace: &mut Trace,
) {
    for p in ctx.processes.values() {
        if let Some(&from) = before.get(&p.pid) {
            if from != p.prio {
                trace.record(
                    tick,
                    TraceKind::PrioChanged {
                        pid: p.pid,
                        from,
                        to: p.prio,
                    },
                );
            }
        }
    }
}
