use sched_sim::{Pid, ResourceId, SimFormat, Trace, TraceKind};

/// Initialize tracing from `RUST_LOG`.
///
/// `try_init()` is idempotent: first call in the process succeeds,
/// subsequent calls are silently ignored.
pub fn setup_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(SimFormat)
        .with_test_writer()
        .try_init();
}

/// Pids promoted out of `resource`'s wait-set, in order.
#[allow(dead_code)]
pub fn woke_order(trace: &Trace, resource: ResourceId) -> Vec<Pid> {
    trace
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            TraceKind::Woke { pid, resource: r } if r == resource => Some(pid),
            _ => None,
        })
        .collect()
}

/// Walk the trace and assert that no resource is ever acquired while
/// another process holds it.
#[allow(dead_code)]
pub fn assert_mutual_exclusion(trace: &Trace) {
    let mut owners: Vec<(ResourceId, Pid)> = Vec::new();
    for e in trace.events() {
        match e.kind {
            TraceKind::Acquired { pid, resource } => {
                if let Some((_, holder)) = owners.iter().find(|(r, _)| *r == resource) {
                    panic!(
                        "tick {}: {pid} acquired {resource} held by {holder}",
                        e.tick
                    );
                }
                owners.push((resource, pid));
            }
            TraceKind::Released { pid, resource } => {
                let idx = owners
                    .iter()
                    .position(|&(r, p)| r == resource && p == pid)
                    .unwrap_or_else(|| panic!("tick {}: {pid} released unheld {resource}", e.tick));
                owners.remove(idx);
            }
            _ => {}
        }
    }
}
