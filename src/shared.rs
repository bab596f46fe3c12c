use crate::{
    error::{AddError, LaneError},
    lane::{Lane, LaneId},
    scheduler::PolicyKind,
    stats::LaneStats,
    task::{Task, TaskId},
};
use static_assertions::assert_impl_all;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A lane shared between the command side (add/kill) and the ticking side
/// (advance). Every operation, reads included, runs under the lane's mutex,
/// so callers never see a task record halfway through an update. Clones
/// refer to the same lane.
#[derive(Clone, Debug)]
pub struct SharedLane {
    id: LaneId,
    policy: PolicyKind,
    inner: Arc<Mutex<Lane>>,
}
assert_impl_all!(SharedLane: Send, Sync);

impl SharedLane {
    pub fn new(lane: Lane) -> Self {
        Self {
            id: lane.id(),
            policy: lane.policy(),
            inner: Arc::new(Mutex::new(lane)),
        }
    }

    pub fn id(&self) -> LaneId {
        self.id
    }
    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    /// Exclusive access for compound operations. Blocks until the lane is free.
    pub fn lock(&self) -> MutexGuard<'_, Lane> {
        // a panic mid-operation leaves no half-applied state behind worth
        // refusing access over
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, task: Task) -> Result<TaskId, AddError> {
        self.lock().add(task)
    }
    pub fn kill(&self, id: TaskId) -> Result<(), LaneError> {
        self.lock().kill(id)
    }
    pub fn advance(&self, delta: u64) -> Vec<TaskId> {
        self.lock().advance(delta)
    }
    pub fn release(&self, id: TaskId) -> Option<Task> {
        self.lock().release(id)
    }

    pub fn running(&self) -> Option<Task> {
        self.lock().running()
    }
    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.lock().task(id).cloned()
    }
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks()
    }
    pub fn waiting(&self) -> Vec<TaskId> {
        self.lock().waiting()
    }
    pub fn finished(&self) -> Vec<TaskId> {
        self.lock().finished().to_vec()
    }
    pub fn num_waiting(&self) -> usize {
        self.lock().num_waiting()
    }
    pub fn num_finished(&self) -> usize {
        self.lock().num_finished()
    }
    pub fn free_memory(&self) -> u64 {
        self.lock().free_memory()
    }
    pub fn stats(&self) -> LaneStats {
        self.lock().stats()
    }
}

impl From<Lane> for SharedLane {
    fn from(lane: Lane) -> Self {
        Self::new(lane)
    }
}
