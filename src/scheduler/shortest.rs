use crate::{scheduler::Scheduler, task::TaskId};
use std::collections::VecDeque;

/// Shortest-process-first. Selection compares the *original* duration of
/// each waiting task, not its remaining time; ties go to the task queued
/// first. Non-preemptive: a selected task runs to completion.
pub struct ShortestFirst {
    // (task id, original duration) in arrival order
    q: VecDeque<(TaskId, u64)>,
}

impl ShortestFirst {
    pub fn new() -> Self {
        Self { q: VecDeque::new() }
    }
}

impl Default for ShortestFirst {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ShortestFirst {
    fn push(&mut self, id: TaskId, total: u64) {
        self.q.push_back((id, total));
    }

    fn pop(&mut self) -> Option<TaskId> {
        // min_by_key returns the first of equal minimums
        let (pos, _) = self
            .q
            .iter()
            .enumerate()
            .min_by_key(|(_, (_, total))| *total)?;
        self.q.remove(pos).map(|(id, _)| id)
    }

    fn remove(&mut self, id: TaskId) -> bool {
        let Some(pos) = self.q.iter().position(|(q, _)| *q == id) else {
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
        self.q.iter().map(|(id, _)| *id).collect()
    }
}
