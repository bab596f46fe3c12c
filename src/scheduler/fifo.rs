use crate::{scheduler::Scheduler, task::TaskId};
use std::collections::VecDeque;

/// Arrival-order queue. Tasks run to completion.
pub struct Fifo {
    q: VecDeque<TaskId>,
}

impl Fifo {
    pub fn new() -> Self {
        Self { q: VecDeque::new() }
    }
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for Fifo {
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
}
