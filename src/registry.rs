use crate::{
    config::Config,
    error::LaneError,
    event::Event,
    lane::{Lane, LaneId},
    scheduler::PolicyKind,
    shared::SharedLane,
    stats::LaneStats,
    task::{IdGen, Task, TaskId},
    workload::Workload,
};
use ahash::AHashMap;
use flume::{Receiver, Sender, TrySendError};
use log::{debug, info, trace, warn};
use static_assertions::assert_impl_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Id of the lane every registry starts with. It cannot be removed.
pub const PRIMARY_LANE: LaneId = 0;

/// Outcome of [`Registry::load`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Lanes spawned for workload entries that did not name an existing lane.
    pub lanes_created: Vec<LaneId>,
    pub submitted: Vec<TaskId>,
    /// Tasks no lane would admit. They are dropped.
    pub rejected: usize,
}

/// Owns every lane of a simulated machine along with the id generators for
/// tasks and lanes. Command handlers submit and kill through it, the ticker
/// calls [`Registry::tick`], and observers read [`Event`]s from
/// [`Registry::events`].
///
/// Events for one lane are sent while that lane is locked, so an observer
/// sees them in the order the lane produced them.
pub struct Registry {
    config: Config,
    lanes: RwLock<BTreeMap<LaneId, SharedLane>>,
    task_ids: IdGen,
    lane_ids: IdGen,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    dropped_events: AtomicU64,
}
assert_impl_all!(Registry: Send, Sync);

impl Registry {
    pub fn new(config: Config) -> Self {
        let (events_tx, events_rx) = match config.event_capacity {
            Some(cap) => flume::bounded(cap),
            None => flume::unbounded(),
        };
        let lane_ids = IdGen::starting_at(PRIMARY_LANE);
        let primary = Lane::new(lane_ids.next(), PolicyKind::Fifo, config.primary_memory);
        let mut lanes = BTreeMap::new();
        lanes.insert(primary.id(), SharedLane::new(primary));
        Self {
            config,
            lanes: RwLock::new(lanes),
            task_ids: IdGen::new(),
            lane_ids,
            events_tx,
            events_rx,
            dropped_events: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Receiver for the event feed. All receivers share one queue: each
    /// event goes to exactly one of them.
    pub fn events(&self) -> Receiver<Event> {
        self.events_rx.clone()
    }

    /// Events discarded because a bounded feed was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    fn emit(&self, event: Event) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                trace!("event feed full, dropped {:?}", event);
            }
            // we hold a receiver ourselves
            Err(TrySendError::Disconnected(_)) => unreachable!("event feed disconnected"),
        }
    }

    pub fn spawn_lane(&self, policy: PolicyKind, memory: u64) -> LaneId {
        let lane = Lane::new(self.lane_ids.next(), policy, memory);
        let id = lane.id();
        self.write_lanes().insert(id, SharedLane::new(lane));
        info!("spawned lane {} ({}, memory {})", id, policy, memory);
        id
    }

    /// Spawn a lane with the configured default memory.
    pub fn spawn_lane_default(&self, policy: PolicyKind) -> LaneId {
        self.spawn_lane(policy, self.config.lane_memory)
    }

    /// Remove a lane and everything on it. Observers get a final update for
    /// each task that was still waiting or running.
    ///
    /// Those tasks are killed under the lane lock, so a tick that grabbed
    /// the lane before it left the map finds nothing left to advance.
    pub fn remove_lane(&self, id: LaneId) -> Result<SharedLane, LaneError> {
        if id == PRIMARY_LANE {
            return Err(LaneError::PrimaryLane);
        }
        let lane = self
            .write_lanes()
            .remove(&id)
            .ok_or(LaneError::UnknownLane(id))?;
        {
            let mut guard = lane.lock();
            let active = guard
                .tasks()
                .iter()
                .filter(|t| !t.is_terminal())
                .map(Task::id)
                .collect::<Vec<_>>();
            for task in active {
                if guard.kill(task).is_ok() {
                    self.emit(Event::finished(task));
                }
            }
        }
        info!("removed lane {}", id);
        Ok(lane)
    }

    pub fn lane(&self, id: LaneId) -> Option<SharedLane> {
        self.read_lanes().get(&id).cloned()
    }

    pub fn lane_ids(&self) -> Vec<LaneId> {
        self.read_lanes().keys().copied().collect()
    }

    /// One stats row per lane, ordered by lane id.
    pub fn stats(&self) -> Vec<LaneStats> {
        self.snapshot().iter().map(SharedLane::stats).collect()
    }

    /// A fresh task with the next task id. It belongs to the caller until
    /// it is admitted somewhere.
    pub fn create_task(&self, name: impl Into<String>, total: u64, memory: u64) -> Task {
        Task::new(self.task_ids.next(), name, total, memory)
    }

    /// Create a task and admit it to `lane`. A rejected task is dropped and
    /// the reason returned.
    pub fn submit(
        &self,
        lane: LaneId,
        name: impl Into<String>,
        total: u64,
        memory: u64,
    ) -> Result<TaskId, LaneError> {
        let shared = self.lane(lane).ok_or(LaneError::UnknownLane(lane))?;
        let task = self.create_task(name, total, memory);
        let event = (task.total() > 0).then(|| Event::created(&task, lane));

        let mut guard = shared.lock();
        let id = guard.add(task)?;
        if let Some(event) = event {
            self.emit(event);
        }
        Ok(id)
    }

    pub fn kill(&self, lane: LaneId, task: TaskId) -> Result<(), LaneError> {
        let shared = self.lane(lane).ok_or(LaneError::UnknownLane(lane))?;
        let mut guard = shared.lock();
        guard.kill(task)?;
        self.emit(Event::finished(task));
        Ok(())
    }

    /// Advance every lane by `delta`, in lane id order, and publish the
    /// results: a final update for each completed task, then the progress
    /// of whatever is running. Returns the completed ids.
    pub fn tick(&self, delta: u64) -> Vec<TaskId> {
        let mut all = Vec::new();
        for shared in self.snapshot() {
            let mut lane = shared.lock();
            let completed = lane.advance(delta);
            for id in &completed {
                self.emit(Event::finished(*id));
            }
            if let Some(task) = lane.running() {
                self.emit(Event::updated(task.id(), task.memory(), task.remaining()));
            }
            all.extend(completed);
        }
        all
    }

    /// Apply a parsed workload. Lane entries whose id already exists reuse
    /// that lane; the others spawn a new lane and tasks naming them are
    /// remapped. Tasks naming a lane the workload did not list go to the
    /// primary lane.
    pub fn load(&self, workload: &Workload) -> LoadReport {
        let mut report = LoadReport::default();
        let mut mapping = AHashMap::new();
        for spec in &workload.lanes {
            if let Some(lane) = self.lane(spec.id) {
                mapping.insert(spec.id, lane.id());
            } else {
                let id = self.spawn_lane(spec.policy, spec.memory);
                mapping.insert(spec.id, id);
                report.lanes_created.push(id);
            }
        }
        for spec in &workload.tasks {
            let lane = mapping.get(&spec.lane).copied().unwrap_or(PRIMARY_LANE);
            match self.submit(lane, spec.name.clone(), spec.duration, spec.memory) {
                Ok(id) => report.submitted.push(id),
                Err(err) => {
                    warn!("workload task {} dropped: {}", spec.name, err);
                    report.rejected += 1;
                }
            }
        }
        debug!(
            "loaded workload: {} lanes created, {} tasks submitted, {} rejected",
            report.lanes_created.len(),
            report.submitted.len(),
            report.rejected
        );
        report
    }

    // Clone out the lane handles so no lane is locked while the map is.
    fn snapshot(&self) -> Vec<SharedLane> {
        self.read_lanes().values().cloned().collect()
    }

    fn read_lanes(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<LaneId, SharedLane>> {
        self.lanes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lanes(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<LaneId, SharedLane>> {
        self.lanes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
