//! Per-process statistics derived from a simulation trace.
//!
//! # Metrics Computed
//!
//! - **Turnaround**: ticks from admission to exit (or to the end of the run)
//! - **Response**: ticks from admission to the first tick of CPU time
//! - **Ready wait**: ticks spent runnable but not running
//! - **Blocked**: ticks spent in a resource wait-set
//!
//! Distributions across processes use [`DistributionStats`].

use std::collections::BTreeMap;
use std::io::Write;

use crate::trace::{Trace, TraceKind};
use crate::types::{Pid, Tick};

/// Summary statistics for a distribution of values.
#[derive(Debug, Clone, Default)]
pub struct DistributionStats {
    pub count: usize,
    /// Minimum value (or 0 if empty).
    pub min: Tick,
    /// Maximum value (or 0 if empty).
    pub max: Tick,
    pub sum: Tick,
    sum_sq: u128,
}

impl DistributionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: Tick) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += (value as u128) * (value as u128);
    }

    /// Mean value (or 0 if empty).
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Standard deviation (or 0 if empty or single sample).
    pub fn stddev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            let mean = self.mean();
            let variance = (self.sum_sq as f64 / self.count as f64) - (mean * mean);
            variance.max(0.0).sqrt()
        }
    }
}

/// Statistics for one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub pid: Pid,
    /// Tick the process was admitted.
    pub arrival: Tick,
    pub first_run: Option<Tick>,
    /// Tick of the last unit of CPU time, if the process finished.
    pub exit: Option<Tick>,
    /// Ticks of CPU time consumed.
    pub ran: Tick,
    pub ready_wait: Tick,
    pub blocked: Tick,
    /// Number of times the process was switched in.
    pub schedule_count: usize,
    /// Number of failed resource requests.
    pub block_count: usize,
}

impl ProcessStats {
    /// Ticks from admission to exit, inclusive of the exit tick.
    pub fn turnaround(&self) -> Option<Tick> {
        self.exit.map(|e| e + 1 - self.arrival)
    }

    pub fn response(&self) -> Option<Tick> {
        self.first_run.map(|r| r - self.arrival)
    }
}

/// Whole-run statistics.
#[derive(Debug, Clone, Default)]
pub struct TraceStats {
    pub processes: BTreeMap<Pid, ProcessStats>,
    /// Turnaround of finished processes.
    pub turnaround: DistributionStats,
    pub response: DistributionStats,
    pub ready_wait: DistributionStats,
    pub end_tick: Tick,
}

impl TraceStats {
    /// Compute statistics from a simulation trace.
    pub fn from_trace(trace: &Trace) -> Self {
        let mut stats = TraceStats {
            end_tick: trace.end_tick(),
            ..Default::default()
        };
        let mut blocked_since: BTreeMap<Pid, Tick> = BTreeMap::new();

        for event in trace.events() {
            let tick = event.tick;
            match event.kind {
                TraceKind::Forked { pid } => {
                    stats.processes.insert(
                        pid,
                        ProcessStats {
                            pid,
                            arrival: tick,
                            ..Default::default()
                        },
                    );
                }
                TraceKind::Switched { next: Some(pid), .. } => {
                    if let Some(ps) = stats.processes.get_mut(&pid) {
                        ps.schedule_count += 1;
                    }
                }
                TraceKind::Ran { pid, .. } => {
                    if let Some(ps) = stats.processes.get_mut(&pid) {
                        ps.ran += 1;
                        ps.first_run.get_or_insert(tick);
                    }
                }
                TraceKind::Blocked { pid, .. } => {
                    blocked_since.insert(pid, tick);
                    if let Some(ps) = stats.processes.get_mut(&pid) {
                        ps.block_count += 1;
                    }
                }
                // The waiter is promoted after the releaser's run, so the
                // wake tick still counts as blocked.
                TraceKind::Woke { pid, .. } => {
                    if let (Some(since), Some(ps)) =
                        (blocked_since.remove(&pid), stats.processes.get_mut(&pid))
                    {
                        ps.blocked += tick + 1 - since;
                    }
                }
                TraceKind::Exited { pid } => {
                    if let Some(ps) = stats.processes.get_mut(&pid) {
                        ps.exit = Some(tick);
                    }
                }
                _ => {}
            }
        }

        // Still blocked when the run stopped.
        for (pid, since) in blocked_since {
            if let Some(ps) = stats.processes.get_mut(&pid) {
                ps.blocked += stats.end_tick.saturating_sub(since);
            }
        }

        for ps in stats.processes.values_mut() {
            let lifetime = match ps.exit {
                Some(e) => e + 1 - ps.arrival,
                None => stats.end_tick.saturating_sub(ps.arrival),
            };
            ps.ready_wait = lifetime.saturating_sub(ps.ran + ps.blocked);

            if let Some(t) = ps.turnaround() {
                stats.turnaround.add(t);
            }
            if let Some(r) = ps.response() {
                stats.response.add(r);
            }
            stats.ready_wait.add(ps.ready_wait);
        }
        stats
    }

    pub fn process(&self, pid: Pid) -> Option<&ProcessStats> {
        self.processes.get(&pid)
    }

    /// Write a per-process table followed by the distributions.
    pub fn write_summary(&self, trace: &Trace, w: &mut impl Write) -> std::io::Result<()> {
        writeln!(
            w,
            "{:>5}  {:<12} {:>7} {:>5} {:>5} {:>7} {:>7} {:>10} {:>8}",
            "pid", "name", "arrival", "exit", "ran", "ready", "blocked", "turnaround", "response"
        )?;
        for ps in self.processes.values() {
            let opt = |v: Option<Tick>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
            writeln!(
                w,
                "{:>5}  {:<12} {:>7} {:>5} {:>5} {:>7} {:>7} {:>10} {:>8}",
                ps.pid,
                trace.process_name(ps.pid),
                ps.arrival,
                opt(ps.exit),
                ps.ran,
                ps.ready_wait,
                ps.blocked,
                opt(ps.turnaround()),
                opt(ps.response()),
            )?;
        }
        writeln!(w)?;
        for (label, dist) in [
            ("turnaround", &self.turnaround),
            ("response", &self.response),
            ("ready wait", &self.ready_wait),
        ] {
            writeln!(
                w,
                "{label:<11} mean {:.2}  stddev {:.2}  min {}  max {}",
                dist.mean(),
                dist.stddev(),
                dist.min,
                dist.max
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Simulator;
    use crate::process::ProcessDef;
    use crate::scenario::Scenario;
    use crate::strategy::Strategy;

    #[test]
    fn test_distribution_stats_empty() {
        let d = DistributionStats::new();
        assert_eq!(d.count, 0);
        assert_eq!(d.mean(), 0.0);
        assert_eq!(d.stddev(), 0.0);
    }

    #[test]
    fn test_distribution_stats_multiple() {
        let mut d = DistributionStats::new();
        for v in [2, 4, 4, 4, 5, 5, 7, 9] {
            d.add(v);
        }
        assert_eq!(d.min, 2);
        assert_eq!(d.max, 9);
        assert!((d.mean() - 5.0).abs() < 1e-9);
        assert!((d.stddev() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_fifo_wait_accounting() {
        let scenario = Scenario::builder()
            .add_process("a", 3, 0)
            .add_process("b", 2, 0)
            .build();
        let trace = Simulator::new(Strategy::Fifo).run(scenario);
        let stats = TraceStats::from_trace(&trace);

        let a = stats.process(Pid(1)).unwrap();
        assert_eq!(a.turnaround(), Some(3));
        assert_eq!(a.ready_wait, 0);

        let b = stats.process(Pid(2)).unwrap();
        assert_eq!(b.first_run, Some(3));
        assert_eq!(b.response(), Some(3));
        assert_eq!(b.turnaround(), Some(5));
        assert_eq!(b.ready_wait, 3);
        assert_eq!(b.blocked, 0);
    }

    #[test]
    fn test_blocked_ticks() {
        // a holds R0 for its first three ticks; b wants it at age 0.
        let scenario = Scenario::builder()
            .process(ProcessDef::new(Pid(1), "a", 4, 0).hold(0, 0, 3))
            .process(ProcessDef::new(Pid(2), "b", 1, 0).start(1).hold(0, 0, 1))
            .build();
        let trace = Simulator::new(Strategy::RoundRobin).run(scenario);
        let stats = TraceStats::from_trace(&trace);

        // b blocks at tick 1 and a takes the tick instead. a releases at
        // the end of tick 2, so b runs at tick 3.
        let b = stats.process(Pid(2)).unwrap();
        assert_eq!(b.block_count, 1);
        assert_eq!(b.blocked, 2);
        assert_eq!(b.exit, Some(3));
        assert_eq!(b.ready_wait, 0);
    }
}
