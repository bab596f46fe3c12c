//! Workload files describe lanes and the tasks to submit to them.
//!
//! The format is whitespace separated:
//!
//! ```text
//! <lane count>
//! <lane id> <schedule type> <memory>       one line per lane
//! <task count>
//! <name> <duration> <memory> <lane id>     one line per task
//! ```
//!
//! Schedule types are `0` (fifo), `1` (round robin) and `2` (shortest
//! process first).

use crate::lane::LaneId;
use crate::scheduler::PolicyKind;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("failed to read workload: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of workload, expected {expected}")]
    UnexpectedEof { expected: &'static str },
    #[error("line {line}: invalid {expected} '{token}'")]
    InvalidNumber {
        line: usize,
        expected: &'static str,
        token: String,
    },
    #[error("line {line}: invalid schedule type '{token}'")]
    InvalidPolicy { line: usize, token: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaneSpec {
    pub id: LaneId,
    pub policy: PolicyKind,
    pub memory: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub duration: u64,
    pub memory: u64,
    pub lane: LaneId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workload {
    pub lanes: Vec<LaneSpec>,
    pub tasks: Vec<TaskSpec>,
}

struct Tokens<'a> {
    inner: Box<dyn Iterator<Item = (usize, &'a str)> + 'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        let inner = text
            .lines()
            .enumerate()
            .flat_map(|(n, line)| line.split_whitespace().map(move |t| (n + 1, t)));
        Self {
            inner: Box::new(inner),
        }
    }

    fn word(&mut self, expected: &'static str) -> Result<(usize, &'a str), WorkloadError> {
        self.inner
            .next()
            .ok_or(WorkloadError::UnexpectedEof { expected })
    }

    fn number<T: FromStr>(&mut self, expected: &'static str) -> Result<T, WorkloadError> {
        let (line, token) = self.word(expected)?;
        token.parse().map_err(|_| WorkloadError::InvalidNumber {
            line,
            expected,
            token: token.to_string(),
        })
    }

    fn policy(&mut self) -> Result<PolicyKind, WorkloadError> {
        let (line, token) = self.word("schedule type")?;
        token
            .parse::<u8>()
            .ok()
            .and_then(|code| PolicyKind::try_from(code).ok())
            .ok_or_else(|| WorkloadError::InvalidPolicy {
                line,
                token: token.to_string(),
            })
    }
}

// counts come from the file; reserve at most this many entries up front
const MAX_RESERVED: usize = 1024;

impl Workload {
    pub fn parse(text: &str) -> Result<Self, WorkloadError> {
        let mut tokens = Tokens::new(text);

        let lane_count: usize = tokens.number("lane count")?;
        let mut lanes = Vec::with_capacity(lane_count.min(MAX_RESERVED));
        for _ in 0..lane_count {
            let id = tokens.number("lane id")?;
            let policy = tokens.policy()?;
            let memory = tokens.number("lane memory")?;
            lanes.push(LaneSpec { id, policy, memory });
        }

        let task_count: usize = tokens.number("task count")?;
        let mut tasks = Vec::with_capacity(task_count.min(MAX_RESERVED));
        for _ in 0..task_count {
            let (_, name) = tokens.word("task name")?;
            let duration = tokens.number("task duration")?;
            let memory = tokens.number("task memory")?;
            let lane = tokens.number("task lane id")?;
            tasks.push(TaskSpec {
                name: name.to_string(),
                duration,
                memory,
                lane,
            });
        }
        Ok(Self { lanes, tasks })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WorkloadError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

impl FromStr for Workload {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
