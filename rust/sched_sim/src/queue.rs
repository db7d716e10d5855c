//! Ordered process queues.
//!
//! [`ProcQueue`] backs both the process-wide ready queue and every
//! resource's wait-set. Membership is by [`Pid`] into the context's process
//! table, so moving a process between queues is a remove plus a push and a
//! process can never be linked into two queues by accident.
//!
//! Selection helpers scan in queue order and keep the first entry that
//! wins, so ties always go to the process that was enqueued earliest.

use std::collections::VecDeque;

use crate::types::Pid;

/// An insertion-ordered queue of process ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcQueue {
    entries: VecDeque<Pid>,
}

/// The process-wide queue of `Ready` processes.
pub type ReadyQueue = ProcQueue;

impl ProcQueue {
    pub fn new() -> Self {
        ProcQueue {
            entries: VecDeque::new(),
        }
    }

    /// Append to the tail.
    ///
    /// # Panics
    /// Panics if `pid` is already queued here.
    pub fn push_back(&mut self, pid: Pid) {
        assert!(
            !self.contains(pid),
            "process {pid} is already a member of this queue"
        );
        self.entries.push_back(pid);
    }

    /// Remove and return the head.
    pub fn pop_front(&mut self) -> Option<Pid> {
        self.entries.pop_front()
    }

    /// The head without removing it.
    pub fn front(&self) -> Option<Pid> {
        self.entries.front().copied()
    }

    /// Remove a specific process. Returns true if it was queued.
    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.entries.iter().position(|&p| p == pid) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued processes in order, head first.
    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.entries.iter().copied()
    }

    /// Snapshot of the queue order.
    pub fn pids(&self) -> Vec<Pid> {
        self.entries.iter().copied().collect()
    }

    /// The earliest-queued process with the largest key.
    pub fn first_max_by_key<K: Ord>(&self, mut key: impl FnMut(Pid) -> K) -> Option<Pid> {
        let mut best: Option<(Pid, K)> = None;
        for pid in self.iter() {
            let k = key(pid);
            match &best {
                Some((_, best_k)) if k <= *best_k => {}
                _ => best = Some((pid, k)),
            }
        }
        best.map(|(pid, _)| pid)
    }

    /// The earliest-queued process with the smallest key.
    pub fn first_min_by_key<K: Ord>(&self, mut key: impl FnMut(Pid) -> K) -> Option<Pid> {
        let mut best: Option<(Pid, K)> = None;
        for pid in self.iter() {
            let k = key(pid);
            match &best {
                Some((_, best_k)) if k >= *best_k => {}
                _ => best = Some((pid, k)),
            }
        }
        best.map(|(pid, _)| pid)
    }
}
