use crate::lane::LaneId;
use crate::task::{Task, TaskId};

/// Errors reported by lanes and the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaneError {
    #[error("task {task} needs {needed} memory but lane {lane} has {free} free")]
    InsufficientMemory {
        lane: LaneId,
        task: TaskId,
        needed: u64,
        free: u64,
    },
    #[error("task {0} is already admitted")]
    DuplicateTask(TaskId),
    #[error("task {0} has already terminated")]
    TerminatedTask(TaskId),
    #[error("task {0} is not waiting or running")]
    UnknownTask(TaskId),
    #[error("invalid schedule type {0}")]
    InvalidPolicy(u8),
    #[error("lane {0} not found")]
    UnknownLane(LaneId),
    #[error("cannot remove the primary lane")]
    PrimaryLane,
}

/// A rejected admission. The task is handed back so the caller keeps
/// ownership of it.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct AddError {
    task: Task,
    reason: LaneError,
}

impl AddError {
    pub(crate) fn new(task: Task, reason: LaneError) -> Self {
        Self { task, reason }
    }
    pub fn reason(&self) -> &LaneError {
        &self.reason
    }
    pub fn task(&self) -> &Task {
        &self.task
    }
    pub fn into_task(self) -> Task {
        self.task
    }
    pub fn into_parts(self) -> (Task, LaneError) {
        (self.task, self.reason)
    }
}

impl From<AddError> for LaneError {
    fn from(err: AddError) -> Self {
        err.reason
    }
}
