//! Resource acquire/release protocols.
//!
//! `acquire` either hands the resource to the requester (`true`) or parks
//! the requester in the resource's wait-set with status `Wait` (`false`).
//! `release` clears ownership and promotes at most one waiter to the tail
//! of the ready queue. The protocols differ in which waiter is promoted
//! and in how they rewrite priorities along the way.

use tracing::debug;

use crate::context::SimContext;
use crate::process::ProcessStatus;
use crate::types::{Pid, ResourceId};

/// Which waiter a release promotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeOrder {
    /// The earliest waiter.
    Fifo,
    /// The highest-priority waiter, earliest on ties.
    Priority,
}

/// How processes obtain and give back resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceProtocol {
    /// Plain mutual exclusion, no priority side effects.
    Mutex(WakeOrder),
    /// Priority ceiling: a holder runs at the system maximum priority
    /// until it releases.
    Ceiling(WakeOrder),
    /// Priority inheritance: a holder temporarily takes the priority of a
    /// more urgent process that blocks on it. Always wakes by priority.
    Inheritance,
}

impl Default for ResourceProtocol {
    fn default() -> Self {
        ResourceProtocol::Mutex(WakeOrder::Fifo)
    }
}

impl ResourceProtocol {
    pub fn name(self) -> &'static str {
        match self {
            ResourceProtocol::Mutex(_) => "mutex",
            ResourceProtocol::Ceiling(_) => "priority-ceiling",
            ResourceProtocol::Inheritance => "priority-inheritance",
        }
    }

    pub fn wake_order(self) -> WakeOrder {
        match self {
            ResourceProtocol::Mutex(order) | ResourceProtocol::Ceiling(order) => order,
            ResourceProtocol::Inheritance => WakeOrder::Priority,
        }
    }

    /// Request `resource` on behalf of `requester`.
    ///
    /// # Panics
    /// Panics if `requester` already owns `resource`.
    pub fn acquire(self, ctx: &mut SimContext, resource: ResourceId, requester: Pid) -> bool {
        let owner = ctx.resources.resource_mut(resource).owner;
        let Some(owner) = owner else {
            ctx.resources.resource_mut(resource).owner = Some(requester);
            if let ResourceProtocol::Ceiling(_) = self {
                let max_prio = ctx.limits.max_prio;
                ctx.process_mut(requester).prio = max_prio;
            }
            debug!(
                pid = requester.0,
                resource = resource.0,
                prio = ctx.process(requester).prio,
                "acquired"
            );
            return true;
        };

        assert!(
            owner != requester,
            "process {requester} requested {resource} which it already owns"
        );

        if self == ResourceProtocol::Inheritance {
            let prio = ctx.process(requester).prio;
            let holder = ctx.process_mut(owner);
            if holder.prio < prio {
                debug!(
                    pid = owner.0,
                    from = holder.prio,
                    to = prio,
                    donor = requester.0,
                    "inherit priority"
                );
                holder.prio = prio;
            }
        }

        ctx.block_on(requester, resource);
        debug!(
            pid = requester.0,
            resource = resource.0,
            owner = owner.0,
            "blocked"
        );
        false
    }

    /// Give back `resource`, promoting one waiter if any.
    ///
    /// # Panics
    /// Panics if `releaser` is not the owner, or if the promoted waiter is
    /// not in `Wait` status.
    pub fn release(self, ctx: &mut SimContext, resource: ResourceId, releaser: Pid) {
        let r = ctx.resources.resource_mut(resource);
        assert!(
            r.owner == Some(releaser),
            "process {releaser} released {resource} owned by {:?}",
            r.owner
        );
        r.owner = None;

        if matches!(
            self,
            ResourceProtocol::Ceiling(_) | ResourceProtocol::Inheritance
        ) {
            let p = ctx.process_mut(releaser);
            p.prio = p.prio_orig;
        }
        debug!(pid = releaser.0, resource = resource.0, "released");

        let Some(waitqueue) = ctx.resources.get(resource).map(|r| &r.waitqueue) else {
            return;
        };
        let waiter = match self.wake_order() {
            WakeOrder::Fifo => waitqueue.front(),
            WakeOrder::Priority => waitqueue.first_max_by_key(|pid| ctx.process(pid).prio),
        };
        let Some(waiter) = waiter else {
            return;
        };

        let status = ctx.process(waiter).status;
        assert!(
            status == ProcessStatus::Wait,
            "waiter {waiter} on {resource} is {status:?}, not Wait"
        );
        ctx.resources.resource_mut(resource).waitqueue.remove(waiter);
        ctx.make_ready(waiter);
        debug!(pid = waiter.0, resource = resource.0, "woke");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessDef;
    use crate::types::{Prio, PrioLimits, MAX_PRIO};

    const R0: ResourceId = ResourceId(0);

    /// Context where every process has been taken off the ready queue, as
    /// if each had been running when it made its request.
    fn ctx_with(prios: &[(u32, Prio)]) -> SimContext {
        let mut ctx = SimContext::new(2, PrioLimits::default());
        for &(pid, prio) in prios {
            ctx.admit(&ProcessDef {
                name: format!("p{pid}"),
                pid: Pid(pid),
                start: 0,
                lifespan: 10,
                prio,
                resources: vec![],
            });
            ctx.ready.remove(Pid(pid));
            ctx.process_mut(Pid(pid)).status = ProcessStatus::Running;
        }
        ctx
    }

    #[test]
    fn test_mutex_acquire_free_and_busy() {
        let proto = ResourceProtocol::default();
        let mut ctx = ctx_with(&[(1, 0), (2, 0)]);

        assert!(proto.acquire(&mut ctx, R0, Pid(1)));
        assert_eq!(ctx.resources.owner(R0), Some(Pid(1)));

        assert!(!proto.acquire(&mut ctx, R0, Pid(2)));
        assert_eq!(ctx.process(Pid(2)).status, ProcessStatus::Wait);
        assert_eq!(ctx.resources.waiting_on(Pid(2)), Some(R0));
        assert!(!ctx.ready.contains(Pid(2)));
    }

    #[test]
    fn test_mutex_fifo_wake_in_arrival_order() {
        let proto = ResourceProtocol::Mutex(WakeOrder::Fifo);
        let mut ctx = ctx_with(&[(1, 0), (2, 9), (3, 1), (4, 5)]);
        assert!(proto.acquire(&mut ctx, R0, Pid(1)));
        for pid in [2, 3, 4] {
            assert!(!proto.acquire(&mut ctx, R0, Pid(pid)));
        }

        proto.release(&mut ctx, R0, Pid(1));
        assert_eq!(ctx.ready.pids(), vec![Pid(2)]);
        assert_eq!(ctx.process(Pid(2)).status, ProcessStatus::Ready);
        assert_eq!(ctx.resources.owner(R0), None);
        // Other waiters stay put.
        let waiting = ctx.resources.get(R0).map(|r| r.waitqueue.pids());
        assert_eq!(waiting, Some(vec![Pid(3), Pid(4)]));
    }

    #[test]
    fn test_priority_wake_picks_most_urgent_waiter() {
        let proto = ResourceProtocol::Mutex(WakeOrder::Priority);
        let mut ctx = ctx_with(&[(1, 0), (2, 3), (3, 8), (4, 8)]);
        assert!(proto.acquire(&mut ctx, R0, Pid(1)));
        for pid in [2, 3, 4] {
            proto.acquire(&mut ctx, R0, Pid(pid));
        }
        proto.release(&mut ctx, R0, Pid(1));
        assert_eq!(ctx.ready.pids(), vec![Pid(3)]);
    }

    #[test]
    fn test_mutex_leaves_priorities_alone() {
        let proto = ResourceProtocol::Mutex(WakeOrder::Priority);
        let mut ctx = ctx_with(&[(1, 1), (2, 9)]);
        proto.acquire(&mut ctx, R0, Pid(1));
        proto.acquire(&mut ctx, R0, Pid(2));
        assert_eq!(ctx.process(Pid(1)).prio, 1);
        proto.release(&mut ctx, R0, Pid(1));
        assert_eq!(ctx.process(Pid(1)).prio, 1);
    }

    #[test]
    fn test_ceiling_boosts_and_restores() {
        let proto = ResourceProtocol::Ceiling(WakeOrder::Priority);
        let mut ctx = ctx_with(&[(1, 2), (2, 5)]);

        assert!(proto.acquire(&mut ctx, R0, Pid(1)));
        assert_eq!(ctx.process(Pid(1)).prio, MAX_PRIO);

        // A blocked requester is not boosted.
        assert!(!proto.acquire(&mut ctx, R0, Pid(2)));
        assert_eq!(ctx.process(Pid(2)).prio, 5);

        proto.release(&mut ctx, R0, Pid(1));
        assert_eq!(ctx.process(Pid(1)).prio, 2);
        assert_eq!(ctx.ready.pids(), vec![Pid(2)]);
    }

    #[test]
    fn test_ceiling_uses_configured_maximum() {
        let proto = ResourceProtocol::Ceiling(WakeOrder::Fifo);
        let mut ctx = ctx_with(&[(1, 2)]);
        ctx.limits.max_prio = 40;
        proto.acquire(&mut ctx, R0, Pid(1));
        assert_eq!(ctx.process(Pid(1)).prio, 40);
    }

    #[test]
    fn test_inheritance_raises_owner_only_when_higher() {
        let proto = ResourceProtocol::Inheritance;
        let mut ctx = ctx_with(&[(1, 4), (2, 2), (3, 9)]);
        assert!(proto.acquire(&mut ctx, R0, Pid(1)));

        assert!(!proto.acquire(&mut ctx, R0, Pid(2)));
        assert_eq!(ctx.process(Pid(1)).prio, 4);

        assert!(!proto.acquire(&mut ctx, R0, Pid(3)));
        assert_eq!(ctx.process(Pid(1)).prio, 9);

        proto.release(&mut ctx, R0, Pid(1));
        assert_eq!(ctx.process(Pid(1)).prio, 4);
        // The most urgent waiter goes first even though it came last.
        assert_eq!(ctx.ready.pids(), vec![Pid(3)]);
        assert_eq!(proto.wake_order(), WakeOrder::Priority);
    }

    #[test]
    fn test_release_with_no_waiters_is_quiet() {
        let proto = ResourceProtocol::Inheritance;
        let mut ctx = ctx_with(&[(1, 4)]);
        proto.acquire(&mut ctx, R0, Pid(1));
        proto.release(&mut ctx, R0, Pid(1));
        assert!(ctx.ready.is_empty());
        assert_eq!(ctx.resources.owner(R0), None);
    }

    #[test]
    #[should_panic(expected = "released R0 owned by")]
    fn test_release_by_non_owner_panics() {
        let proto = ResourceProtocol::default();
        let mut ctx = ctx_with(&[(1, 0), (2, 0)]);
        proto.acquire(&mut ctx, R0, Pid(1));
        proto.release(&mut ctx, R0, Pid(2));
    }

    #[test]
    #[should_panic(expected = "released R0 owned by None")]
    fn test_release_of_free_resource_panics() {
        let mut ctx = ctx_with(&[(1, 0)]);
        ResourceProtocol::default().release(&mut ctx, R0, Pid(1));
    }

    #[test]
    #[should_panic(expected = "not Wait")]
    fn test_promoting_non_waiting_process_panics() {
        let proto = ResourceProtocol::default();
        let mut ctx = ctx_with(&[(1, 0), (2, 0)]);
        proto.acquire(&mut ctx, R0, Pid(1));
        proto.acquire(&mut ctx, R0, Pid(2));
        ctx.process_mut(Pid(2)).status = ProcessStatus::Ready;
        proto.release(&mut ctx, R0, Pid(1));
    }

    #[test]
    #[should_panic(expected = "already owns")]
    fn test_reacquire_own_resource_panics() {
        let proto = ResourceProtocol::default();
        let mut ctx = ctx_with(&[(1, 0)]);
        proto.acquire(&mut ctx, R0, Pid(1));
        proto.acquire(&mut ctx, R0, Pid(1));
    }
}
