#![doc = include_str!("../README.md")]

mod config;
mod driver;
mod error;
mod event;
mod lane;
mod registry;
mod shared;
mod stats;
mod task;
mod workload;

pub mod scheduler;

pub use config::Config;
pub use driver::{Ticker, BUSY_PERIOD};
pub use error::{AddError, LaneError};
pub use event::{Event, MAX_REPORTED_TIME};
pub use lane::{Lane, LaneId};
pub use registry::{LoadReport, Registry, PRIMARY_LANE};
pub use scheduler::{PolicyKind, Scheduler};
pub use shared::SharedLane;
pub use stats::{render_table, LaneCounters, LaneStats};
pub use task::{IdGen, Task, TaskId, TaskStatus};
pub use workload::{LaneSpec, TaskSpec, Workload, WorkloadError};
