//! Process model for the simulator.
//!
//! A [`ProcessDef`] describes a process before it arrives: its lifespan,
//! priority, arrival tick and the resources it holds along the way. Once
//! admitted, the driver turns it into a runtime [`Process`] record that
//! policies and protocols mutate.

use crate::types::{Pid, Prio, ResourceId, Tick};

/// The state a simulated process can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Eligible to run; a member of the ready queue.
    Ready,
    /// Currently selected to run this tick.
    Running,
    /// Blocked in a resource's wait-set.
    Wait,
    /// Consumed its whole lifespan.
    Terminated,
}

/// A scripted resource hold: acquire `resource` when the process's age is
/// `at`, release it once `duration` further ticks of CPU time have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUse {
    pub resource: ResourceId,
    pub at: Tick,
    pub duration: Tick,
}

impl ResourceUse {
    /// Age at which the resource is released.
    pub fn release_at(&self) -> Tick {
        self.at + self.duration
    }
}

/// Definition of a process for scenario creation.
#[derive(Debug, Clone)]
pub struct ProcessDef {
    pub name: String,
    pub pid: Pid,
    /// Tick at which the process is created and becomes ready.
    pub start: Tick,
    /// Ticks of CPU time required before the process terminates.
    pub lifespan: Tick,
    /// Initial (and original) priority.
    pub prio: Prio,
    pub resources: Vec<ResourceUse>,
}

/// A simulated process at runtime.
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub status: ProcessStatus,
    /// Ticks of CPU time consumed so far.
    pub age: Tick,
    pub lifespan: Tick,
    /// Effective priority, rewritten by aging and resource protocols.
    pub prio: Prio,
    /// Baseline priority that boosts and inheritance restore to.
    pub prio_orig: Prio,
    pub resources: Vec<ResourceUse>,
}

impl Process {
    /// Create a freshly admitted process in `Ready` state.
    pub fn new(def: &ProcessDef) -> Self {
        Process {
            pid: def.pid,
            name: def.name.clone(),
            status: ProcessStatus::Ready,
            age: 0,
            lifespan: def.lifespan,
            prio: def.prio,
            prio_orig: def.prio,
            resources: def.resources.clone(),
        }
    }

    /// Ticks of CPU time still needed.
    pub fn remaining(&self) -> Tick {
        self.lifespan.saturating_sub(self.age)
    }

    /// Whether the process has consumed its whole lifespan.
    pub fn is_done(&self) -> bool {
        self.age >= self.lifespan
    }

    /// Resources to request at the current age.
    pub fn acquires_due(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources
            .iter()
            .filter(move |u| u.at == self.age)
            .map(|u| u.resource)
    }

    /// Resources to give back at the current age.
    pub fn releases_due(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources
            .iter()
            .filter(move |u| u.release_at() == self.age)
            .map(|u| u.resource)
    }
}

impl ProcessDef {
    /// A process arriving at tick 0 that holds no resources.
    pub fn new(pid: Pid, name: &str, lifespan: Tick, prio: Prio) -> Self {
        ProcessDef {
            name: name.to_string(),
            pid,
            start: 0,
            lifespan,
            prio,
            resources: Vec::new(),
        }
    }

    /// Arrive at `tick` instead of tick 0.
    pub fn start(mut self, tick: Tick) -> Self {
        self.start = tick;
        self
    }

    /// Hold `resource` from age `at` for `duration` ticks of CPU time.
    pub fn hold(mut self, resource: usize, at: Tick, duration: Tick) -> Self {
        self.resources.push(ResourceUse {
            resource: ResourceId(resource),
            at,
            duration,
        });
        self
    }
}
