//! Simulation context: all mutable scheduling state in one value.
//!
//! Policies and protocols receive a `&mut SimContext` instead of touching
//! globals. The context owns the process table, the ready queue, the
//! resource table, the current-process slot and the tick counter.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::process::{Process, ProcessDef, ProcessStatus};
use crate::queue::ReadyQueue;
use crate::resource::ResourceTable;
use crate::types::{Pid, PrioLimits, ResourceId, Tick};

/// Shared state threaded through every policy and protocol call.
#[derive(Debug, Clone)]
pub struct SimContext {
    /// Every admitted process, including terminated ones.
    pub processes: BTreeMap<Pid, Process>,
    pub ready: ReadyQueue,
    pub resources: ResourceTable,
    /// Process selected by the last scheduling decision, if any.
    pub current: Option<Pid>,
    pub limits: PrioLimits,
    ticks: Tick,
}

impl SimContext {
    pub fn new(nr_resources: usize, limits: PrioLimits) -> Self {
        SimContext {
            processes: BTreeMap::new(),
            ready: ReadyQueue::new(),
            resources: ResourceTable::new(nr_resources),
            current: None,
            limits,
            ticks: 0,
        }
    }

    /// Monotonic tick counter. Owned by the driver; read-only elsewhere.
    pub fn ticks(&self) -> Tick {
        self.ticks
    }

    pub(crate) fn advance_tick(&mut self) {
        self.ticks += 1;
    }

    /// Create a process from its definition and append it to the ready
    /// queue.
    ///
    /// # Panics
    /// Panics if the pid is already in use.
    pub fn admit(&mut self, def: &ProcessDef) -> Pid {
        assert!(
            !self.processes.contains_key(&def.pid),
            "process {} admitted twice",
            def.pid
        );
        self.processes.insert(def.pid, Process::new(def));
        self.ready.push_back(def.pid);
        def.pid
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    /// # Panics
    /// Panics if `pid` was never admitted.
    pub fn process(&self, pid: Pid) -> &Process {
        self.processes
            .get(&pid)
            .unwrap_or_else(|| panic!("unknown process {pid}"))
    }

    /// # Panics
    /// Panics if `pid` was never admitted.
    pub fn process_mut(&mut self, pid: Pid) -> &mut Process {
        self.processes
            .get_mut(&pid)
            .unwrap_or_else(|| panic!("unknown process {pid}"))
    }

    pub fn current_process(&self) -> Option<&Process> {
        self.current.and_then(|pid| self.processes.get(&pid))
    }

    /// Mark `pid` ready and append it to the ready queue tail.
    pub fn make_ready(&mut self, pid: Pid) {
        self.process_mut(pid).status = ProcessStatus::Ready;
        self.ready.push_back(pid);
    }

    /// Mark `pid` waiting and append it to `resource`'s wait-set.
    pub fn block_on(&mut self, pid: Pid, resource: ResourceId) {
        self.process_mut(pid).status = ProcessStatus::Wait;
        self.resources.resource_mut(resource).waitqueue.push_back(pid);
    }

    /// Number of admitted processes that have not terminated.
    pub fn nr_live(&self) -> usize {
        self.processes
            .values()
            .filter(|p| p.status != ProcessStatus::Terminated)
            .count()
    }

    /// Check queue and ownership invariants.
    ///
    /// - every process is in at most one of {ready queue, one wait-set};
    /// - ready-queue members are `Ready`, wait-set members are `Wait`, and
    ///   every `Ready`/`Wait` process is queued accordingly;
    /// - only the current process may be `Running`, and it is not queued;
    /// - an owner is never blocked on the resource it holds, and never
    ///   terminated while holding it.
    pub fn audit(&self) -> Result<(), InvariantViolation> {
        let mut seen: HashMap<Pid, Membership> = HashMap::new();

        for pid in self.ready.iter() {
            if seen.insert(pid, Membership::Ready).is_some() {
                return Err(InvariantViolation::DuplicateMembership { pid });
            }
            self.expect_status(pid, ProcessStatus::Ready, Membership::Ready)?;
        }

        for r in self.resources.iter() {
            for pid in r.waitqueue.iter() {
                if seen.insert(pid, Membership::Wait(r.id)).is_some() {
                    return Err(InvariantViolation::DuplicateMembership { pid });
                }
                self.expect_status(pid, ProcessStatus::Wait, Membership::Wait(r.id))?;
                if r.owner == Some(pid) {
                    return Err(InvariantViolation::OwnerWaiting {
                        pid,
                        resource: r.id,
                    });
                }
            }
            if let Some(owner) = r.owner {
                let p = self
                    .get(owner)
                    .ok_or(InvariantViolation::UnknownProcess { pid: owner })?;
                if p.status == ProcessStatus::Terminated {
                    return Err(InvariantViolation::TerminatedOwner {
                        pid: owner,
                        resource: r.id,
                    });
                }
            }
        }

        for p in self.processes.values() {
            let membership = seen.get(&p.pid).copied();
            match (p.status, membership) {
                (ProcessStatus::Ready, Some(Membership::Ready))
                | (ProcessStatus::Wait, Some(Membership::Wait(_)))
                | (ProcessStatus::Terminated, None) => {}
                (ProcessStatus::Running, None) if self.current == Some(p.pid) => {}
                (status, _) => {
                    return Err(InvariantViolation::Unqueued {
                        pid: p.pid,
                        status,
                    })
                }
            }
        }

        Ok(())
    }

    fn expect_status(
        &self,
        pid: Pid,
        expected: ProcessStatus,
        location: Membership,
    ) -> Result<(), InvariantViolation> {
        let p = self
            .get(pid)
            .ok_or(InvariantViolation::UnknownProcess { pid })?;
        if p.status != expected {
            return Err(InvariantViolation::StatusMismatch {
                pid,
                status: p.status,
                location,
            });
        }
        Ok(())
    }
}

/// Where a queued process was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Ready,
    Wait(ResourceId),
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Membership::Ready => f.write_str("ready queue"),
            Membership::Wait(r) => write!(f, "wait-set of {r}"),
        }
    }
}

/// A broken queue or ownership invariant found by [`SimContext::audit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A queue references a pid that is not in the process table.
    UnknownProcess { pid: Pid },
    /// The process is linked into more than one queue.
    DuplicateMembership { pid: Pid },
    /// The process sits in a queue that does not match its status.
    StatusMismatch {
        pid: Pid,
        status: ProcessStatus,
        location: Membership,
    },
    /// The process's status requires a queue (or the CPU) it is not in.
    Unqueued { pid: Pid, status: ProcessStatus },
    /// The owner of a resource is blocked on that same resource.
    OwnerWaiting { pid: Pid, resource: ResourceId },
    /// A terminated process still owns a resource.
    TerminatedOwner { pid: Pid, resource: ResourceId },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::UnknownProcess { pid } => {
                write!(f, "queue references unknown process {pid}")
            }
            InvariantViolation::DuplicateMembership { pid } => {
                write!(f, "process {pid} is a member of more than one queue")
            }
            InvariantViolation::StatusMismatch {
                pid,
                status,
                location,
            } => write!(f, "process {pid} is {status:?} but queued in the {location}"),
            InvariantViolation::Unqueued { pid, status } => {
                write!(f, "process {pid} is {status:?} but not where that status requires")
            }
            InvariantViolation::OwnerWaiting { pid, resource } => {
                write!(f, "process {pid} owns {resource} and waits on it")
            }
            InvariantViolation::TerminatedOwner { pid, resource } => {
                write!(f, "terminated process {pid} still owns {resource}")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(pid: u32, lifespan: Tick, prio: u32) -> ProcessDef {
        ProcessDef {
            name: format!("p{pid}"),
            pid: Pid(pid),
            start: 0,
            lifespan,
            prio,
            resources: vec![],
        }
    }

    #[test]
    fn test_admit_enqueues_ready() {
        let mut ctx = SimContext::new(2, PrioLimits::default());
        ctx.admit(&def(1, 3, 5));
        ctx.admit(&def(2, 4, 1));

        assert_eq!(ctx.ready.pids(), vec![Pid(1), Pid(2)]);
        let p = ctx.process(Pid(1));
        assert_eq!(p.status, ProcessStatus::Ready);
        assert_eq!(p.age, 0);
        assert_eq!((p.prio, p.prio_orig), (5, 5));
        assert_eq!(ctx.nr_live(), 2);
        assert_eq!(ctx.audit(), Ok(()));
    }

    #[test]
    #[should_panic(expected = "admitted twice")]
    fn test_duplicate_admit_panics() {
        let mut ctx = SimContext::new(1, PrioLimits::default());
        ctx.admit(&def(1, 3, 0));
        ctx.admit(&def(1, 3, 0));
    }

    #[test]
    fn test_audit_detects_double_membership() {
        let mut ctx = SimContext::new(1, PrioLimits::default());
        ctx.admit(&def(1, 3, 0));
        ctx.resources
            .resource_mut(ResourceId(0))
            .waitqueue
            .push_back(Pid(1));

        assert_eq!(
            ctx.audit(),
            Err(InvariantViolation::DuplicateMembership { pid: Pid(1) })
        );
    }

    #[test]
    fn test_audit_detects_status_mismatch() {
        let mut ctx = SimContext::new(1, PrioLimits::default());
        ctx.admit(&def(1, 3, 0));
        ctx.process_mut(Pid(1)).status = ProcessStatus::Wait;

        assert!(matches!(
            ctx.audit(),
            Err(InvariantViolation::StatusMismatch {
                pid: Pid(1),
                status: ProcessStatus::Wait,
                location: Membership::Ready,
            })
        ));
    }

    #[test]
    fn test_audit_running_must_be_current() {
        let mut ctx = SimContext::new(1, PrioLimits::default());
        ctx.admit(&def(1, 3, 0));
        ctx.ready.pop_front();
        ctx.process_mut(Pid(1)).status = ProcessStatus::Running;
        assert!(ctx.audit().is_err());

        ctx.current = Some(Pid(1));
        assert_eq!(ctx.audit(), Ok(()));
    }

    #[test]
    fn test_audit_owner_waiting_on_own_resource() {
        let mut ctx = SimContext::new(1, PrioLimits::default());
        ctx.admit(&def(1, 3, 0));
        ctx.ready.pop_front();
        ctx.resources.resource_mut(ResourceId(0)).owner = Some(Pid(1));
        ctx.block_on(Pid(1), ResourceId(0));

        assert_eq!(
            ctx.audit(),
            Err(InvariantViolation::OwnerWaiting {
                pid: Pid(1),
                resource: ResourceId(0),
            })
        );
    }

    #[test]
    fn test_violation_messages() {
        let v = InvariantViolation::TerminatedOwner {
            pid: Pid(4),
            resource: ResourceId(2),
        };
        assert_eq!(v.to_string(), "terminated process 4 still owns R2");
    }
}
