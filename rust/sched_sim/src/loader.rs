//! JSON scenario files.
//!
//! ```json
//! {
//!     "resources": 8,
//!     "max_ticks": 500,
//!     "strategy": "pip",
//!     /* block comments are allowed */
//!     "processes": [
//!         { "pid": 1, "name": "low", "start": 0, "lifespan": 8, "prio": 1,
//!           "resources": [{ "resource": 0, "at": 1, "duration": 4 }] }
//!     ]
//! }
//! ```
//!
//! Omitted fields default as follows: `pid` to the position in the list plus
//! one, `name` to `p<pid>`, `start` and `prio` to 0. Top-level `resources`,
//! `max_ticks`, `max_prio`, `aging_cap` and `audit` fall back to the same
//! defaults as [`Scenario::builder`].

use serde::Deserialize;

use crate::process::ProcessDef;
use crate::scenario::{Scenario, ScenarioError};
use crate::strategy::{Strategy, UnknownStrategy};
use crate::types::{Pid, Prio, Tick};

/// Errors from loading a scenario file.
#[derive(Debug)]
pub enum LoadError {
    /// JSON parse error, including unknown or mistyped fields.
    Json(serde_json::Error),
    UnknownStrategy(UnknownStrategy),
    /// The file parsed but describes a scenario that cannot run.
    Invalid(ScenarioError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Json(e) => write!(f, "JSON parse error: {e}"),
            LoadError::UnknownStrategy(e) => write!(f, "{e}"),
            LoadError::Invalid(e) => write!(f, "invalid scenario: {e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Json(e) => Some(e),
            LoadError::UnknownStrategy(e) => Some(e),
            LoadError::Invalid(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}

impl From<UnknownStrategy> for LoadError {
    fn from(e: UnknownStrategy) -> Self {
        LoadError::UnknownStrategy(e)
    }
}

impl From<ScenarioError> for LoadError {
    fn from(e: ScenarioError) -> Self {
        LoadError::Invalid(e)
    }
}

/// A validated scenario and the strategy the file asked for, if any.
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub scenario: Scenario,
    pub strategy: Option<Strategy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    resources: Option<usize>,
    max_ticks: Option<Tick>,
    max_prio: Option<Prio>,
    aging_cap: Option<Prio>,
    audit: Option<bool>,
    strategy: Option<String>,
    processes: Vec<ProcessEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessEntry {
    pid: Option<u32>,
    name: Option<String>,
    #[serde(default)]
    start: Tick,
    lifespan: Tick,
    #[serde(default)]
    prio: Prio,
    #[serde(default)]
    resources: Vec<HoldEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HoldEntry {
    resource: usize,
    at: Tick,
    duration: Tick,
}

/// Strip C-style block comments (`/* ... */`) from input.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            loop {
                match chars.next() {
                    Some('*') if chars.peek() == Some(&'/') => {
                        chars.next();
                        break;
                    }
                    Some(_) => continue,
                    None => break,
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse and validate a JSON scenario.
///
/// # Example
///
/// ```
/// use sched_sim::load_scenario;
///
/// let json = r#"{ "strategy": "rr", "processes": [{ "lifespan": 3 }] }"#;
/// let loaded = load_scenario(json).unwrap();
/// assert_eq!(loaded.scenario.processes[0].name, "p1");
/// ```
pub fn load_scenario(json_str: &str) -> Result<LoadedScenario, LoadError> {
    let cleaned = strip_comments(json_str);
    let file: ScenarioFile = serde_json::from_str(&cleaned)?;

    let strategy = file
        .strategy
        .as_deref()
        .map(str::parse::<Strategy>)
        .transpose()?;

    let mut builder = Scenario::builder();
    if let Some(nr) = file.resources {
        builder = builder.resources(nr);
    }
    if let Some(ticks) = file.max_ticks {
        builder = builder.max_ticks(ticks);
    }
    if let Some(prio) = file.max_prio {
        builder = builder.max_prio(prio);
    }
    if let Some(cap) = file.aging_cap {
        builder = builder.aging_cap(cap);
    }
    if let Some(audit) = file.audit {
        builder = builder.audit(audit);
    }

    for (i, entry) in file.processes.into_iter().enumerate() {
        let pid = Pid(entry.pid.unwrap_or(i as u32 + 1));
        let name = entry.name.unwrap_or_else(|| format!("p{pid}"));
        let mut def = ProcessDef::new(pid, &name, entry.lifespan, entry.prio).start(entry.start);
        for hold in entry.resources {
            def = def.hold(hold.resource, hold.at, hold.duration);
        }
        builder = builder.process(def);
    }

    let scenario = builder.build();
    scenario.validate()?;
    Ok(LoadedScenario { scenario, strategy })
}
