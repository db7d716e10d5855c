//! sched_sim - Deterministic tick-driven simulator for uniprocessor CPU
//! scheduling policies and resource-locking protocols.
//!
//! Processes with scripted lifespans and resource holds run one tick at a
//! time under a selectable strategy. Each strategy pairs a scheduling policy
//! with an acquire/release protocol, which makes priority inversion and its
//! ceiling and inheritance fixes directly observable in the trace.
//!
//! # Architecture
//!
//! - **Context**: Process table, ready queue, resource table and the current slot
//! - **Policies**: FIFO, SJF, SRTF, round-robin, priority and priority with aging
//! - **Protocols**: Plain mutual exclusion, priority ceiling and priority inheritance
//! - **Strategies**: Named policy/protocol bundles selected by key
//! - **Engine**: The tick loop admitting, scheduling, running and retiring processes
//! - **Trace**: Recorded events with queries, a text dump and derived statistics
//!
//! # Usage
//!
//! ```rust,no_run
//! use sched_sim::*;
//!
//! let scenario = Scenario::builder()
//!     .process(ProcessDef::new(Pid(1), "low", 8, 1).hold(0, 1, 4))
//!     .process(ProcessDef::new(Pid(2), "high", 3, 9).start(2).hold(0, 0, 2))
//!     .build();
//!
//! let trace = Simulator::new(Strategy::PriorityInheritance).run(scenario);
//! trace.dump();
//! ```

pub mod context;
pub mod engine;
pub mod fmt;
pub mod loader;
pub mod policy;
pub mod process;
pub mod protocol;
pub mod queue;
pub mod resource;
pub mod scenario;
pub mod stats;
pub mod strategy;
pub mod trace;
pub mod types;

// Re-export the main public types for convenience.
pub use context::{InvariantViolation, Membership, SimContext};
pub use engine::{ExitKind, Simulator};
pub use fmt::{sim_tick, FmtTick, SimFormat};
pub use loader::{load_scenario, LoadError, LoadedScenario};
pub use policy::SchedPolicy;
pub use process::{Process, ProcessDef, ProcessStatus, ResourceUse};
pub use protocol::{ResourceProtocol, WakeOrder};
pub use queue::{ProcQueue, ReadyQueue};
pub use resource::{Resource, ResourceTable};
pub use scenario::{Scenario, ScenarioBuilder, ScenarioError, DEFAULT_MAX_TICKS};
pub use stats::{DistributionStats, ProcessStats, TraceStats};
pub use strategy::{Strategy, UnknownStrategy};
pub use trace::{Trace, TraceEvent, TraceKind, TraceSummary};
pub use types::{Pid, Prio, PrioLimits, ResourceId, Tick, DEFAULT_AGING_CAP, MAX_PRIO, NR_RESOURCES};
