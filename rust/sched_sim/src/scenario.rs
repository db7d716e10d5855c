//! Scenario definition and builder API.

use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::process::ProcessDef;
use crate::types::{Pid, Prio, PrioLimits, ResourceId, Tick, NR_RESOURCES};

/// Default tick limit before a run is cut off.
pub const DEFAULT_MAX_TICKS: Tick = 100_000;

/// Parse a tick limit override. Unset, empty or malformed values fall back
/// to `DEFAULT_MAX_TICKS` (malformed ones with a warning).
pub fn parse_max_ticks(s: Option<&str>) -> Tick {
    match s.map(str::trim) {
        None | Some("") => DEFAULT_MAX_TICKS,
        Some(s) => s.parse::<Tick>().unwrap_or_else(|_| {
            warn!(value = s, "SCHED_SIM_MAX_TICKS: expected a tick count, using default");
            DEFAULT_MAX_TICKS
        }),
    }
}

/// Resolve the tick limit from `SCHED_SIM_MAX_TICKS`.
pub fn max_ticks_from_env() -> Tick {
    parse_max_ticks(std::env::var("SCHED_SIM_MAX_TICKS").ok().as_deref())
}

/// Resolve whether to audit invariants every tick from `SCHED_SIM_AUDIT`.
///
/// - Unset or empty: enabled.
/// - `"0"`: disabled; `"1"`: enabled.
pub fn audit_from_env() -> bool {
    match std::env::var("SCHED_SIM_AUDIT").ok().as_deref() {
        Some("0") => false,
        None | Some("") | Some("1") => true,
        Some(other) => {
            warn!(value = other, "SCHED_SIM_AUDIT: expected 0 or 1, auditing");
            true
        }
    }
}

/// A complete simulation scenario: processes, resources and limits.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub processes: Vec<ProcessDef>,
    /// Size of the resource table.
    pub nr_resources: usize,
    pub limits: PrioLimits,
    /// Ticks after which the run stops with `ExitKind::TickLimit`.
    pub max_ticks: Tick,
    /// Check queue and ownership invariants after every tick.
    pub audit: bool,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder {
            processes: Vec::new(),
            nr_resources: NR_RESOURCES,
            limits: PrioLimits::default(),
            max_ticks: max_ticks_from_env(),
            audit: audit_from_env(),
            next_pid: Pid(1),
        }
    }

    /// Reject scenarios the driver cannot run faithfully.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.limits.aging_cap > self.limits.max_prio {
            return Err(ScenarioError::AgingCapAboveMax {
                aging_cap: self.limits.aging_cap,
                max_prio: self.limits.max_prio,
            });
        }

        let mut pids = HashSet::new();
        for def in &self.processes {
            let pid = def.pid;
            if !pids.insert(pid) {
                return Err(ScenarioError::DuplicatePid { pid });
            }
            if def.lifespan == 0 {
                return Err(ScenarioError::ZeroLifespan { pid });
            }
            for u in &def.resources {
                if u.resource.0 >= self.nr_resources {
                    return Err(ScenarioError::ResourceOutOfRange {
                        pid,
                        resource: u.resource,
                        nr_resources: self.nr_resources,
                    });
                }
                if u.duration == 0 {
                    return Err(ScenarioError::ZeroDuration {
                        pid,
                        resource: u.resource,
                    });
                }
                if u.release_at() > def.lifespan {
                    return Err(ScenarioError::HeldPastLifespan {
                        pid,
                        resource: u.resource,
                    });
                }
            }
            // A resource is held at most once at a time by its owner.
            for (i, a) in def.resources.iter().enumerate() {
                let overlapping = def.resources[i + 1..].iter().any(|b| {
                    a.resource == b.resource && a.at < b.release_at() && b.at < a.release_at()
                });
                if overlapping {
                    return Err(ScenarioError::OverlappingHold {
                        pid,
                        resource: a.resource,
                    });
                }
            }
        }
        Ok(())
    }
}

/// A scenario the driver refuses to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    DuplicatePid {
        pid: Pid,
    },
    ZeroLifespan {
        pid: Pid,
    },
    ResourceOutOfRange {
        pid: Pid,
        resource: ResourceId,
        nr_resources: usize,
    },
    ZeroDuration {
        pid: Pid,
        resource: ResourceId,
    },
    /// The hold would outlive the process.
    HeldPastLifespan {
        pid: Pid,
        resource: ResourceId,
    },
    /// Two holds of the same resource by one process overlap in age.
    OverlappingHold {
        pid: Pid,
        resource: ResourceId,
    },
    AgingCapAboveMax {
        aging_cap: Prio,
        max_prio: Prio,
    },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::DuplicatePid { pid } => write!(f, "pid {pid} defined twice"),
            ScenarioError::ZeroLifespan { pid } => write!(f, "process {pid} has zero lifespan"),
            ScenarioError::ResourceOutOfRange {
                pid,
                resource,
                nr_resources,
            } => write!(
                f,
                "process {pid} uses {resource} but only {nr_resources} resources exist"
            ),
            ScenarioError::ZeroDuration { pid, resource } => {
                write!(f, "process {pid} holds {resource} for zero ticks")
            }
            ScenarioError::HeldPastLifespan { pid, resource } => {
                write!(f, "process {pid} would still hold {resource} when it exits")
            }
            ScenarioError::OverlappingHold { pid, resource } => {
                write!(f, "process {pid} has overlapping holds on {resource}")
            }
            ScenarioError::AgingCapAboveMax {
                aging_cap,
                max_prio,
            } => write!(
                f,
                "aging cap {aging_cap} exceeds maximum priority {max_prio}"
            ),
        }
    }
}

impl std::error::Error for ScenarioError {}

/// Builder for constructing scenarios.
pub struct ScenarioBuilder {
    processes: Vec<ProcessDef>,
    nr_resources: usize,
    limits: PrioLimits,
    max_ticks: Tick,
    audit: bool,
    next_pid: Pid,
}

impl ScenarioBuilder {
    /// Add a fully specified process.
    pub fn process(mut self, def: ProcessDef) -> Self {
        if def.pid.0 >= self.next_pid.0 {
            self.next_pid = Pid(def.pid.0.saturating_add(1));
        }
        self.processes.push(def);
        self
    }

    /// Add a process arriving at tick 0 with an auto-assigned pid.
    pub fn add_process(self, name: &str, lifespan: Tick, prio: Prio) -> Self {
        let pid = self.next_pid;
        self.process(ProcessDef::new(pid, name, lifespan, prio))
    }

    /// Size of the resource table.
    pub fn resources(mut self, nr: usize) -> Self {
        self.nr_resources = nr;
        self
    }

    pub fn max_ticks(mut self, ticks: Tick) -> Self {
        self.max_ticks = ticks;
        self
    }

    /// Priority given to holders under the ceiling protocol. Pulls the
    /// aging cap down to `prio - 1` if it was above that.
    pub fn max_prio(mut self, prio: Prio) -> Self {
        self.limits.max_prio = prio;
        self.limits.aging_cap = self.limits.aging_cap.min(prio.saturating_sub(1));
        self
    }

    /// Priority at which aging stops.
    pub fn aging_cap(mut self, prio: Prio) -> Self {
        self.limits.aging_cap = prio;
        self
    }

    pub fn audit(mut self, enabled: bool) -> Self {
        self.audit = enabled;
        self
    }

    pub fn build(self) -> Scenario {
        Scenario {
            processes: self.processes,
            nr_resources: self.nr_resources,
            limits: self.limits,
            max_ticks: self.max_ticks,
            audit: self.audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_ticks() {
        assert_eq!(parse_max_ticks(None), DEFAULT_MAX_TICKS);
        assert_eq!(parse_max_ticks(Some("")), DEFAULT_MAX_TICKS);
        assert_eq!(parse_max_ticks(Some(" 250 ")), 250);
        assert_eq!(parse_max_ticks(Some("lots")), DEFAULT_MAX_TICKS);
    }

    #[test]
    fn test_builder_assigns_pids() {
        let s = Scenario::builder()
            .add_process("a", 3, 1)
            .process(ProcessDef::new(Pid(10), "b", 2, 0))
            .add_process("c", 1, 0)
            .resources(4)
            .build();
        let pids: Vec<Pid> = s.processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![Pid(1), Pid(10), Pid(11)]);
        assert_eq!(s.nr_resources, 4);
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_processes() {
        let dup = Scenario::builder()
            .process(ProcessDef::new(Pid(1), "a", 1, 0))
            .process(ProcessDef::new(Pid(1), "b", 1, 0))
            .build();
        assert_eq!(
            dup.validate(),
            Err(ScenarioError::DuplicatePid { pid: Pid(1) })
        );

        let zero = Scenario::builder().add_process("a", 0, 0).build();
        assert_eq!(
            zero.validate(),
            Err(ScenarioError::ZeroLifespan { pid: Pid(1) })
        );
    }

    #[test]
    fn test_validate_rejects_bad_holds() {
        let out_of_range = Scenario::builder()
            .resources(2)
            .process(ProcessDef::new(Pid(1), "a", 5, 0).hold(2, 0, 1))
            .build();
        assert!(matches!(
            out_of_range.validate(),
            Err(ScenarioError::ResourceOutOfRange { nr_resources: 2, .. })
        ));

        let too_long = Scenario::builder()
            .process(ProcessDef::new(Pid(1), "a", 5, 0).hold(0, 3, 3))
            .build();
        assert_eq!(
            too_long.validate(),
            Err(ScenarioError::HeldPastLifespan {
                pid: Pid(1),
                resource: ResourceId(0),
            })
        );

        let empty_hold = Scenario::builder()
            .process(ProcessDef::new(Pid(1), "a", 5, 0).hold(0, 1, 0))
            .build();
        assert!(matches!(
            empty_hold.validate(),
            Err(ScenarioError::ZeroDuration { .. })
        ));

        let same_age = Scenario::builder()
            .process(ProcessDef::new(Pid(1), "a", 4, 0).hold(0, 0, 1).hold(0, 0, 2))
            .build();
        assert_eq!(
            same_age.validate(),
            Err(ScenarioError::OverlappingHold {
                pid: Pid(1),
                resource: ResourceId(0),
            })
        );

        let nested = Scenario::builder()
            .process(ProcessDef::new(Pid(1), "a", 4, 0).hold(0, 0, 3).hold(0, 1, 1))
            .build();
        assert!(matches!(
            nested.validate(),
            Err(ScenarioError::OverlappingHold { .. })
        ));

        // Back-to-back holds and holds of different resources are fine.
        let back_to_back = Scenario::builder()
            .process(
                ProcessDef::new(Pid(1), "a", 4, 0)
                    .hold(0, 0, 2)
                    .hold(0, 2, 2)
                    .hold(1, 1, 2),
            )
            .build();
        assert_eq!(back_to_back.validate(), Ok(()));

        // Releasing exactly at exit is fine.
        let exact = Scenario::builder()
            .process(ProcessDef::new(Pid(1), "a", 5, 0).hold(0, 2, 3))
            .build();
        assert_eq!(exact.validate(), Ok(()));
    }

    #[test]
    fn test_builder_pid_at_max() {
        let s = Scenario::builder()
            .process(ProcessDef::new(Pid(u32::MAX), "last", 1, 0))
            .build();
        assert_eq!(s.processes[0].pid, Pid(u32::MAX));
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn test_lower_max_prio_pulls_cap_down() {
        let s = Scenario::builder().max_prio(10).build();
        assert_eq!(s.limits.aging_cap, 9);
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_aging_cap_above_max() {
        let s = Scenario::builder().max_prio(10).aging_cap(20).build();
        assert_eq!(
            s.validate(),
            Err(ScenarioError::AgingCapAboveMax {
                aging_cap: 20,
                max_prio: 10,
            })
        );
    }
}
