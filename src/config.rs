use std::time::Duration;

/// Registry and ticker settings.
///
/// ```
/// use std::time::Duration;
/// use ticklane::Config;
///
/// let config = Config::default()
///     .with_lane_memory(4_096)
///     .with_tick_period(Duration::from_millis(10));
/// assert_eq!(config.lane_memory, 4_096);
/// assert_eq!(config.primary_memory, 10_000_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Memory of the primary lane (id 0), created with the registry.
    pub primary_memory: u64,
    /// Memory of lanes spawned without an explicit budget.
    pub lane_memory: u64,
    /// Real time between two ticks.
    pub tick_period: Duration,
    /// Simulated time units passed to each lane per tick.
    pub tick_delta: u64,
    /// Bound of the event channel; `None` for unbounded. Events that do not
    /// fit a full bounded channel are dropped and counted.
    pub event_capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_memory: 10_000_000,
            lane_memory: 1_000_000,
            tick_period: Duration::from_secs(1),
            tick_delta: 1,
            event_capacity: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_primary_memory(mut self, memory: u64) -> Self {
        self.primary_memory = memory;
        self
    }
    pub fn with_lane_memory(mut self, memory: u64) -> Self {
        self.lane_memory = memory;
        self
    }
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }
    pub fn with_tick_delta(mut self, delta: u64) -> Self {
        self.tick_delta = delta;
        self
    }
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }
}
