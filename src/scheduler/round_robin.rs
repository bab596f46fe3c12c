use crate::{scheduler::Scheduler, task::TaskId};
use std::collections::VecDeque;

/// Time slice granted per turn.
pub const QUANTUM: u64 = 2;

/// Round-robin queue. The lane preempts the running task once it has used
/// `QUANTUM` units and pushes it back here, behind everything already waiting.
/// Quantum progress is tracked by the lane, so a slice cut short by the end
/// of an advance resumes where it stopped.
pub struct RoundRobin {
    q: VecDeque<TaskId>,
    quantum: u64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            q: VecDeque::new(),
            quantum: QUANTUM,
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for RoundRobin {
    fn push(&mut self, id: TaskId, _total: u64) {
        self.q.push_back(id);
    }

    fn pop(&mut self) -> Option<TaskId> {
        self.q.pop_front()
    }

    fn remove(&mut self, id: TaskId) -> bool {
        let Some(pos) = self.q.iter().position(|q| *q == id) else {
            return false;
        };
        self.q.remove(pos);
        true
    }

    fn is_runnable(&self) -> bool {
        !self.q.is_empty()
    }

    fn len(&self) -> usize {
        self.q.len()
    }

    fn queued(&self) -> Vec<TaskId> {
        self.q.iter().copied().collect()
    }

    fn quantum(&self) -> Option<u64> {
        Some(self.quantum)
    }
}
