use crate::lane::LaneId;
use crate::scheduler::PolicyKind;
use tabled::{settings::Style, Table, Tabled};

/// Cumulative per-lane counters.
/// Only ever touched under the lane lock, so plain u64s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneCounters {
    pub admitted: u64,
    pub rejected: u64,
    pub dispatched: u64, // tasks moved from the waiting queue into the running slot
    pub preempted: u64,  // quantum expirations
    pub completed: u64,
    pub killed: u64,
}

impl LaneCounters {
    pub const fn new() -> Self {
        Self {
            admitted: 0,
            rejected: 0,
            dispatched: 0,
            preempted: 0,
            completed: 0,
            killed: 0,
        }
    }

    #[inline]
    pub fn record_admitted(&mut self) {
        self.admitted += 1;
    }
    #[inline]
    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }
    #[inline]
    pub fn record_dispatch(&mut self) {
        self.dispatched += 1;
    }
    #[inline]
    pub fn record_preempt(&mut self) {
        self.preempted += 1;
    }
    #[inline]
    pub fn record_completed(&mut self) {
        self.completed += 1;
    }
    #[inline]
    pub fn record_killed(&mut self) {
        self.killed += 1;
    }
}

/// Point-in-time view of one lane, as shown by the lane listing.
#[derive(Clone, Debug, PartialEq, Eq, Tabled)]
pub struct LaneStats {
    #[tabled(rename = "ID")]
    pub id: LaneId,
    #[tabled(rename = "type")]
    pub policy: PolicyKind,
    #[tabled(rename = "num tasks")]
    pub tasks: usize,
    #[tabled(rename = "tasks waiting")]
    pub waiting: usize,
    #[tabled(rename = "tasks finished")]
    pub finished: usize,
    #[tabled(rename = "running", display_with = "yes_no")]
    pub running: bool,
    #[tabled(rename = "memory")]
    pub total_memory: u64,
    #[tabled(rename = "free")]
    pub free_memory: u64,
    #[tabled(rename = "clock")]
    pub clock: u64,
    #[tabled(skip)]
    pub counters: LaneCounters,
}

fn yes_no(b: &bool) -> String {
    if *b { "yes" } else { "no" }.to_string()
}

/// Render the lane listing.
pub fn render_table(stats: &[LaneStats]) -> String {
    let mut table = Table::new(stats);
    table.with(Style::modern());
    table.to_string()
}
