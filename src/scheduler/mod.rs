mod fifo;
mod round_robin;
mod shortest;
pub use fifo::Fifo;
pub use round_robin::{RoundRobin, QUANTUM};
pub use shortest::ShortestFirst;

use crate::error::LaneError;
use crate::task::TaskId;
use std::fmt;

/// Per-lane scheduler: owns the waiting queue and chooses *which task*
/// runs next. The lane owns the task records; schedulers only see ids.
pub trait Scheduler: Send {
    /// Enqueue a waiting task at the back. `total` is its original duration.
    fn push(&mut self, id: TaskId, total: u64);
    fn pop(&mut self) -> Option<TaskId>;
    /// Drop a waiting task from the queue. Returns false if it is not queued.
    fn remove(&mut self, id: TaskId) -> bool;
    fn is_runnable(&self) -> bool;
    fn len(&self) -> usize;
    /// Queued ids in queue order (not selection order).
    fn queued(&self) -> Vec<TaskId>;
    /// Longest uninterrupted run a task gets per turn. `None` runs tasks
    /// to completion.
    fn quantum(&self) -> Option<u64> {
        None
    }
}

/// Scheduling discipline of a lane, fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Fifo,
    RoundRobin,
    ShortestFirst,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [
        PolicyKind::Fifo,
        PolicyKind::RoundRobin,
        PolicyKind::ShortestFirst,
    ];

    /// Numeric schedule type used by workload files.
    pub fn code(self) -> u8 {
        match self {
            PolicyKind::Fifo => 0,
            PolicyKind::RoundRobin => 1,
            PolicyKind::ShortestFirst => 2,
        }
    }

    pub fn scheduler(self) -> Box<dyn Scheduler> {
        match self {
            PolicyKind::Fifo => Box::new(Fifo::new()),
            PolicyKind::RoundRobin => Box::new(RoundRobin::new()),
            PolicyKind::ShortestFirst => Box::new(ShortestFirst::new()),
        }
    }
}

impl TryFrom<u8> for PolicyKind {
    type Error = LaneError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PolicyKind::Fifo),
            1 => Ok(PolicyKind::RoundRobin),
            2 => Ok(PolicyKind::ShortestFirst),
            _ => Err(LaneError::InvalidPolicy(code)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyKind::Fifo => "first in first out",
            PolicyKind::RoundRobin => "round robin",
            PolicyKind::ShortestFirst => "shortest process first",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_codes() {
        for kind in PolicyKind::ALL {
            assert_eq!(PolicyKind::try_from(kind.code()), Ok(kind));
        }
        assert_eq!(PolicyKind::try_from(3), Err(LaneError::InvalidPolicy(3)));
        assert_eq!(
            PolicyKind::try_from(255),
            Err(LaneError::InvalidPolicy(255))
        );
    }

    #[test]
    fn test_only_round_robin_preempts() {
        assert_eq!(PolicyKind::Fifo.scheduler().quantum(), None);
        assert_eq!(PolicyKind::RoundRobin.scheduler().quantum(), Some(QUANTUM));
        assert_eq!(PolicyKind::ShortestFirst.scheduler().quantum(), None);
    }
}
