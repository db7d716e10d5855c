//! Trace event recording for the simulator.
//!
//! Every driver action (admission, context switch, tick of CPU time,
//! resource traffic, priority rewrite, exit) is recorded as a
//! [`TraceEvent`] stamped with the tick it happened in.

use std::io::Write;

use crate::engine::ExitKind;
use crate::fmt::FmtTick;
use crate::process::ProcessDef;
use crate::types::{Pid, Prio, ResourceId, Tick};

/// Event counts over a whole trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSummary {
    pub total_events: usize,
    /// Ticks in which some process ran.
    pub busy_ticks: usize,
    pub idle_ticks: usize,
    pub context_switches: usize,
    pub acquisitions: usize,
    pub blocks: usize,
    pub releases: usize,
    pub exits: usize,
}

impl std::fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Trace Summary:")?;
        writeln!(f, "  total_events:     {}", self.total_events)?;
        writeln!(f, "  busy_ticks:       {}", self.busy_ticks)?;
        writeln!(f, "  idle_ticks:       {}", self.idle_ticks)?;
        writeln!(f, "  context_switches: {}", self.context_switches)?;
        writeln!(f, "  acquisitions:     {}", self.acquisitions)?;
        writeln!(f, "  blocks:           {}", self.blocks)?;
        writeln!(f, "  releases:         {}", self.releases)?;
        writeln!(f, "  exits:            {}", self.exits)
    }
}

/// A single trace event produced by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub tick: Tick,
    pub kind: TraceKind,
}

/// The type of scheduling event recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    /// A process was created and placed on the ready queue.
    Forked { pid: Pid },
    /// The scheduling decision changed the current process.
    Switched { prev: Option<Pid>, next: Option<Pid> },
    /// A process consumed one tick of CPU time, reaching `age`.
    Ran { pid: Pid, age: Tick },
    /// Nothing was runnable this tick.
    Idle,
    Acquired { pid: Pid, resource: ResourceId },
    /// The request failed and the process joined the wait-set.
    Blocked { pid: Pid, resource: ResourceId },
    Released { pid: Pid, resource: ResourceId },
    /// A waiter was promoted to the ready queue by a release.
    Woke { pid: Pid, resource: ResourceId },
    /// A protocol or aging rewrote the process's effective priority.
    PrioChanged { pid: Pid, from: Prio, to: Prio },
    /// The process consumed its whole lifespan.
    Exited { pid: Pid },
}

/// A complete simulation trace, containing all events in order.
#[derive(Debug, Clone)]
pub struct Trace {
    events: Vec<TraceEvent>,
    process_names: Vec<(Pid, String)>,
    /// Tick counter value when the run stopped.
    end_tick: Tick,
    exit_kind: ExitKind,
}

impl Trace {
    pub(crate) fn new(processes: &[ProcessDef]) -> Self {
        let process_names = processes.iter().map(|p| (p.pid, p.name.clone())).collect();
        Self {
            events: Vec::new(),
            process_names,
            end_tick: 0,
            exit_kind: ExitKind::Normal,
        }
    }

    /// Resolve a pid to a process name, or `"???"` if unknown.
    pub fn process_name(&self, pid: Pid) -> &str {
        self.process_names
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, n)| n.as_str())
            .unwrap_or("???")
    }

    pub(crate) fn finish(&mut self, end_tick: Tick, kind: ExitKind) {
        self.end_tick = end_tick;
        self.exit_kind = kind;
    }

    /// How the simulation terminated.
    pub fn exit_kind(&self) -> &ExitKind {
        &self.exit_kind
    }

    /// Returns true if the simulation did not end normally.
    pub fn has_error(&self) -> bool {
        self.exit_kind.is_error()
    }

    pub fn end_tick(&self) -> Tick {
        self.end_tick
    }

    pub(crate) fn record(&mut self, tick: Tick, kind: TraceKind) {
        self.events.push(TraceEvent { tick, kind });
    }

    /// All events in order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// The process that ran in each busy tick, in order.
    pub fn run_order(&self) -> Vec<Pid> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::Ran { pid, .. } => Some(pid),
                _ => None,
            })
            .collect()
    }

    /// Process that ran during `tick`, if any.
    pub fn ran_at(&self, tick: Tick) -> Option<Pid> {
        self.events.iter().find_map(|e| match e.kind {
            TraceKind::Ran { pid, .. } if e.tick == tick => Some(pid),
            _ => None,
        })
    }

    /// Ticks of CPU time given to `pid`.
    pub fn ran_ticks(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Ran { pid: p, .. } if p == pid))
            .count()
    }

    /// Count the number of times `pid` was switched in.
    pub fn schedule_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Switched { next: Some(p), .. } if p == pid))
            .count()
    }

    pub fn first_run_tick(&self, pid: Pid) -> Option<Tick> {
        self.events.iter().find_map(|e| match e.kind {
            TraceKind::Ran { pid: p, .. } if p == pid => Some(e.tick),
            _ => None,
        })
    }

    /// Tick in which `pid` ran for the last time.
    pub fn exit_tick(&self, pid: Pid) -> Option<Tick> {
        self.events.iter().find_map(|e| match e.kind {
            TraceKind::Exited { pid: p } if p == pid => Some(e.tick),
            _ => None,
        })
    }

    /// Pids in the order they exited.
    pub fn exit_order(&self) -> Vec<Pid> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::Exited { pid } => Some(pid),
                _ => None,
            })
            .collect()
    }

    /// Priority changes recorded for `pid`, as `(tick, from, to)`.
    pub fn prio_changes(&self, pid: Pid) -> Vec<(Tick, Prio, Prio)> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::PrioChanged { pid: p, from, to } if p == pid => {
                    Some((e.tick, from, to))
                }
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> TraceSummary {
        let mut summary = TraceSummary {
            total_events: self.events.len(),
            ..Default::default()
        };
        for event in &self.events {
            match event.kind {
                TraceKind::Ran { .. } => summary.busy_ticks += 1,
                TraceKind::Idle => summary.idle_ticks += 1,
                TraceKind::Switched { next: Some(_), .. } => summary.context_switches += 1,
                TraceKind::Acquired { .. } => summary.acquisitions += 1,
                TraceKind::Blocked { .. } => summary.blocks += 1,
                TraceKind::Released { .. } => summary.releases += 1,
                TraceKind::Exited { .. } => summary.exits += 1,
                _ => {}
            }
        }
        summary
    }

    /// Pretty-print the trace to `w`, one event per line.
    pub fn write_dump(&self, w: &mut impl Write) -> std::io::Result<()> {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::Forked { pid } => {
                    format!("FORK     pid={} ({})", pid, self.process_name(*pid))
                }
                TraceKind::Switched { prev, next } => format!(
                    "SWITCH   {} -> {}",
                    prev.map_or("-".to_string(), |p| p.to_string()),
                    next.map_or("-".to_string(), |p| p.to_string())
                ),
                TraceKind::Ran { pid, age } => format!("RUN      pid={pid} age={age}"),
                TraceKind::Idle => "IDLE".to_string(),
                TraceKind::Acquired { pid, resource } => {
                    format!("ACQUIRE  pid={pid} res={}", resource.0)
                }
                TraceKind::Blocked { pid, resource } => {
                    format!("BLOCK    pid={pid} res={}", resource.0)
                }
                TraceKind::Released { pid, resource } => {
                    format!("RELEASE  pid={pid} res={}", resource.0)
                }
                TraceKind::Woke { pid, resource } => {
                    format!("WAKE     pid={pid} res={}", resource.0)
                }
                TraceKind::PrioChanged { pid, from, to } => {
                    format!("PRIO     pid={pid} {from} -> {to}")
                }
                TraceKind::Exited { pid } => format!("EXIT     pid={pid}"),
            };
            writeln!(w, "[{}] {}", FmtTick(event.tick), desc)?;
        }
        Ok(())
    }

    /// Pretty-print the trace to stderr for debugging.
    pub fn dump(&self) {
        let _ = self.write_dump(&mut std::io::stderr().lock());
    }
}
