use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub type TaskId = u64;

/// Lifecycle of a task. `Done` and `Error` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Waiting,
    Running,
    Done,
    // killed before it finished
    Error,
}

impl TaskStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Monotonic id source. Each registry owns its own generator for tasks
/// and another for lanes, so ids are unique per generator and never reused.
#[derive(Debug, Default)]
pub struct IdGen {
    next: AtomicU64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    #[inline]
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to `next` will hand out.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// A unit of simulated work: a fixed amount of virtual time and a fixed
/// memory footprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    name: String,
    total: u64,
    remaining: u64,
    memory: u64,
    status: TaskStatus,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, total: u64, memory: u64) -> Self {
        Self {
            id,
            name: name.into(),
            total,
            remaining: total,
            memory,
            status: TaskStatus::Waiting,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn total(&self) -> u64 {
        self.total
    }
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
    /// Time already consumed.
    pub fn elapsed(&self) -> u64 {
        self.total - self.remaining
    }
    pub fn memory(&self) -> u64 {
        self.memory
    }
    pub fn status(&self) -> TaskStatus {
        self.status
    }
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Run for `delta` units. The first call moves a waiting task to
    /// running; reaching zero remaining marks it done. Terminal tasks are
    /// left untouched.
    pub fn run(&mut self, delta: u64) {
        if self.status == TaskStatus::Waiting {
            self.status = TaskStatus::Running;
        }
        if self.status != TaskStatus::Running {
            return;
        }
        self.remaining = self.remaining.saturating_sub(delta);
        if self.remaining == 0 {
            self.status = TaskStatus::Done;
        }
    }

    /// Force the task into `Error`. Returns false if it had already
    /// finished (or was already killed).
    pub fn kill(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Error;
        self.remaining = 0;
        true
    }

    /// Put a running task back to waiting between quanta.
    pub fn block(&mut self) {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::Waiting;
        }
    }

    // Admission resets a non-terminal task to waiting.
    pub(crate) fn reset_waiting(&mut self) {
        debug_assert!(!self.is_terminal());
        self.status = TaskStatus::Waiting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_transitions() {
        let mut task = Task::new(0, "compile", 5, 10);
        assert_eq!(task.status(), TaskStatus::Waiting);
        assert_eq!(task.remaining(), 5);

        task.run(2);
        assert_eq!(task.status(), TaskStatus::Running);
        assert_eq!(task.remaining(), 3);
        assert_eq!(task.elapsed(), 2);

        // overshooting clamps to zero
        task.run(10);
        assert_eq!(task.remaining(), 0);
        assert_eq!(task.status(), TaskStatus::Done);

        // running a finished task is a no-op
        task.run(1);
        assert_eq!(task.remaining(), 0);
        assert_eq!(task.status(), TaskStatus::Done);
    }

    #[test]
    fn test_zero_duration_completes_on_first_run() {
        let mut task = Task::new(1, "noop", 0, 0);
        task.run(0);
        assert_eq!(task.status(), TaskStatus::Done);
    }

    #[test]
    fn test_kill() {
        let mut task = Task::new(2, "sleep", 8, 1);
        task.run(3);
        assert!(task.kill());
        assert_eq!(task.status(), TaskStatus::Error);
        assert_eq!(task.remaining(), 0);
        // irreversible, and run cannot resurrect it
        assert!(!task.kill());
        task.run(1);
        assert_eq!(task.status(), TaskStatus::Error);

        let mut done = Task::new(3, "echo", 1, 1);
        done.run(1);
        assert!(!done.kill());
        assert_eq!(done.status(), TaskStatus::Done);
    }

    #[test]
    fn test_block() {
        let mut task = Task::new(4, "loop", 6, 1);
        // waiting stays waiting
        task.block();
        assert_eq!(task.status(), TaskStatus::Waiting);
        task.run(2);
        task.block();
        assert_eq!(task.status(), TaskStatus::Waiting);
        assert_eq!(task.remaining(), 4);

        task.kill();
        task.block();
        assert_eq!(task.status(), TaskStatus::Error);
    }

    #[test]
    fn test_id_gen_is_monotonic() {
        let ids = IdGen::new();
        assert_eq!(ids.next(), 0);
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.peek(), 2);

        let other = IdGen::starting_at(100);
        assert_eq!(other.next(), 100);
        // generators are independent
        assert_eq!(ids.next(), 2);
    }
}
