//! Named strategy bundles.
//!
//! A [`Strategy`] pairs one [`SchedPolicy`] with one [`ResourceProtocol`]
//! and is the unit an operator selects by name. The set is closed; each
//! variant dispatches to its policy and protocol through the same
//! `schedule`/`acquire`/`release` interface.

use std::fmt;
use std::str::FromStr;

use anyhow::ensure;
use tracing::warn;

use crate::context::SimContext;
use crate::policy::SchedPolicy;
use crate::protocol::{ResourceProtocol, WakeOrder};
use crate::types::{Pid, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    #[default]
    Fifo,
    Sjf,
    Srtf,
    RoundRobin,
    Priority,
    PriorityAging,
    /// Priority scheduling with the priority-ceiling protocol.
    PriorityCeiling,
    /// Priority scheduling with the priority-inheritance protocol.
    PriorityInheritance,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Fifo,
        Strategy::Sjf,
        Strategy::Srtf,
        Strategy::RoundRobin,
        Strategy::Priority,
        Strategy::PriorityAging,
        Strategy::PriorityCeiling,
        Strategy::PriorityInheritance,
    ];

    /// Short lookup key.
    pub fn key(self) -> &'static str {
        match self {
            Strategy::Fifo => "fifo",
            Strategy::Sjf => "sjf",
            Strategy::Srtf => "srtf",
            Strategy::RoundRobin => "rr",
            Strategy::Priority => "prio",
            Strategy::PriorityAging => "pa",
            Strategy::PriorityCeiling => "pcp",
            Strategy::PriorityInheritance => "pip",
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Fifo => "FIFO",
            Strategy::Sjf => "Shortest-Job First",
            Strategy::Srtf => "Shortest Remaining Time First",
            Strategy::RoundRobin => "Round-Robin",
            Strategy::Priority => "Priority",
            Strategy::PriorityAging => "Priority + aging",
            Strategy::PriorityCeiling => "Priority + PCP Protocol",
            Strategy::PriorityInheritance => "Priority + PIP Protocol",
        }
    }

    pub fn policy(self) -> SchedPolicy {
        match self {
            Strategy::Fifo => SchedPolicy::Fifo,
            Strategy::Sjf => SchedPolicy::Sjf,
            Strategy::Srtf => SchedPolicy::Srtf,
            Strategy::RoundRobin => SchedPolicy::RoundRobin,
            Strategy::Priority | Strategy::PriorityCeiling | Strategy::PriorityInheritance => {
                SchedPolicy::Priority
            }
            Strategy::PriorityAging => SchedPolicy::PriorityAging,
        }
    }

    pub fn protocol(self) -> ResourceProtocol {
        match self {
            Strategy::Fifo
            | Strategy::Sjf
            | Strategy::Srtf
            | Strategy::RoundRobin
            | Strategy::PriorityAging => ResourceProtocol::Mutex(WakeOrder::Fifo),
            Strategy::Priority => ResourceProtocol::Mutex(WakeOrder::Priority),
            Strategy::PriorityCeiling => ResourceProtocol::Ceiling(WakeOrder::Priority),
            Strategy::PriorityInheritance => ResourceProtocol::Inheritance,
        }
    }

    /// Run once before the first tick.
    pub fn initialize(self, ctx: &SimContext) -> anyhow::Result<()> {
        let limits = ctx.limits;
        ensure!(
            limits.aging_cap <= limits.max_prio,
            "{}: aging cap {} exceeds maximum priority {}",
            self.name(),
            limits.aging_cap,
            limits.max_prio
        );
        Ok(())
    }

    /// Run once after the last tick. Reports resources left held or
    /// contended.
    pub fn finalize(self, ctx: &SimContext) {
        for r in ctx.resources.iter() {
            if let Some(owner) = r.owner {
                warn!(resource = r.id.0, owner = owner.0, "resource still owned at end of run");
            }
            if !r.waitqueue.is_empty() {
                warn!(
                    resource = r.id.0,
                    waiters = ?r.waitqueue.pids(),
                    "processes still blocked at end of run"
                );
            }
        }
    }

    pub fn schedule(self, ctx: &mut SimContext) -> Option<Pid> {
        self.policy().schedule(ctx)
    }

    /// The current process requests `resource`.
    ///
    /// # Panics
    /// Panics if there is no current process.
    pub fn acquire(self, ctx: &mut SimContext, resource: ResourceId) -> bool {
        let pid = current_or_panic(ctx, "acquire");
        self.protocol().acquire(ctx, resource, pid)
    }

    /// The current process gives back `resource`.
    ///
    /// # Panics
    /// Panics if there is no current process or it does not own `resource`.
    pub fn release(self, ctx: &mut SimContext, resource: ResourceId) {
        let pid = current_or_panic(ctx, "release");
        self.protocol().release(ctx, resource, pid)
    }
}

fn current_or_panic(ctx: &SimContext, op: &str) -> Pid {
    ctx.current
        .unwrap_or_else(|| panic!("{op} called with no current process"))
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a strategy name that matches no bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = Strategy::ALL.iter().map(|s| s.key()).collect();
        write!(
            f,
            "unknown strategy {:?} (expected one of: {})",
            self.0,
            keys.join(", ")
        )
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    /// Look up by key or display name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Strategy::ALL
            .into_iter()
            .find(|st| st.key().eq_ignore_ascii_case(s) || st.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}
