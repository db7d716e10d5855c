//! Newtype wrappers and type aliases for domain concepts.
//!
//! Identifiers (process and resource ids) are newtypes so they cannot be
//! swapped silently. Plain quantities (ticks, priorities) are aliases.

use std::fmt;

/// Process identifier, stable for the process's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Pid(pub u32);

/// Index into the fixed resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

/// Simulated time, in ticks.
pub type Tick = u64;

/// Scheduling priority. Larger values are more urgent.
pub type Prio = u32;

/// System maximum priority. The ceiling protocol boosts holders to this.
pub const MAX_PRIO: Prio = 100;

/// Default number of resources in the table.
pub const NR_RESOURCES: usize = 32;

/// Default ceiling for priority aging. Kept one below `MAX_PRIO` so an
/// aged process never ties a ceiling-boosted resource holder.
pub const DEFAULT_AGING_CAP: Prio = MAX_PRIO - 1;

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Priority bounds shared by the ceiling protocol and aging policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrioLimits {
    /// Priority given to a resource holder under the ceiling protocol.
    pub max_prio: Prio,
    /// Aging stops incrementing a process once its priority reaches this.
    pub aging_cap: Prio,
}

impl Default for PrioLimits {
    fn default() -> Self {
        PrioLimits {
            max_prio: MAX_PRIO,
            aging_cap: DEFAULT_AGING_CAP,
        }
    }
}
