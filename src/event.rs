use crate::lane::LaneId;
use crate::task::{Task, TaskId};
use std::fmt;

/// Largest time value the monitor feed can display.
pub const MAX_REPORTED_TIME: u64 = 999_999;

/// Notification emitted by the registry for observers such as a task
/// monitor. `remaining == 0` on an update means the task is gone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Created {
        id: TaskId,
        name: String,
        lane: LaneId,
        memory: u64,
        remaining: u64,
    },
    Updated {
        id: TaskId,
        memory: u64,
        remaining: u64,
    },
}

impl Event {
    pub fn created(task: &Task, lane: LaneId) -> Self {
        Event::Created {
            id: task.id(),
            name: task.name().to_string(),
            lane,
            memory: task.memory(),
            remaining: task.remaining(),
        }
    }

    /// Progress of a task. A finished task reports no memory.
    pub fn updated(id: TaskId, memory: u64, remaining: u64) -> Self {
        Event::Updated {
            id,
            memory: if remaining == 0 { 0 } else { memory },
            remaining,
        }
    }

    pub fn finished(id: TaskId) -> Self {
        Event::Updated {
            id,
            memory: 0,
            remaining: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        match self {
            Event::Created { id, .. } | Event::Updated { id, .. } => *id,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Event::Updated { remaining: 0, .. })
    }
}

/// Monitor line format: `n<id>-<name>-<lane>-<memory>-<time>|` for new
/// tasks and `u<id>-<memory>-<time>|` for updates.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Created {
                id,
                name,
                lane,
                memory,
                remaining,
            } => write!(
                f,
                "n{}-{}-{}-{}-{}|",
                id,
                name,
                lane,
                memory,
                (*remaining).min(MAX_REPORTED_TIME)
            ),
            Event::Updated {
                id,
                memory,
                remaining,
            } => write!(
                f,
                "u{}-{}-{}|",
                id,
                memory,
                (*remaining).min(MAX_REPORTED_TIME)
            ),
        }
    }
}
