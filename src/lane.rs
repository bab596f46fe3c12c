use crate::{
    error::{AddError, LaneError},
    scheduler::{PolicyKind, Scheduler},
    stats::{LaneCounters, LaneStats},
    task::{Task, TaskId, TaskStatus},
};
use ahash::AHashMap;
use log::{debug, trace, warn};

pub type LaneId = u64;

/// One lane of execution: a memory budget, a scheduling policy and the
/// tasks admitted to it. Exactly one task runs at a time.
///
/// All task records live in a single arena keyed by id; the waiting queue
/// (inside the scheduler), the running slot and the finished list only hold
/// ids. Records stay in the arena after they terminate until the owner
/// calls [`Lane::release`].
pub struct Lane {
    id: LaneId,
    policy: PolicyKind,
    scheduler: Box<dyn Scheduler>,

    tasks: AHashMap<TaskId, Task>,
    running: Option<TaskId>,
    finished: Vec<TaskId>,

    total_memory: u64,
    free_memory: u64,

    // time the running task has used of its current quantum
    slice_used: u64,
    // total simulated time consumed on this lane
    clock: u64,
    counters: LaneCounters,
}

impl Lane {
    pub fn new(id: LaneId, policy: PolicyKind, memory: u64) -> Self {
        Self {
            id,
            policy,
            scheduler: policy.scheduler(),
            tasks: AHashMap::new(),
            running: None,
            finished: Vec::new(),
            total_memory: memory,
            free_memory: memory,
            slice_used: 0,
            clock: 0,
            counters: LaneCounters::new(),
        }
    }

    /// Build a lane from a numeric schedule type, rejecting unknown ones.
    pub fn with_code(id: LaneId, code: u8, memory: u64) -> Result<Self, LaneError> {
        let policy = PolicyKind::try_from(code)?;
        Ok(Self::new(id, policy, memory))
    }

    /// Admit a task. On success the lane owns it; on failure it is handed
    /// back inside the error and the lane is unchanged.
    pub fn add(&mut self, mut task: Task) -> Result<TaskId, AddError> {
        let id = task.id();
        let reason = if self.tasks.contains_key(&id) {
            Some(LaneError::DuplicateTask(id))
        } else if task.is_terminal() {
            Some(LaneError::TerminatedTask(id))
        } else if task.memory() > self.free_memory {
            Some(LaneError::InsufficientMemory {
                lane: self.id,
                task: id,
                needed: task.memory(),
                free: self.free_memory,
            })
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!("lane {}: rejected task {}: {}", self.id, id, reason);
            self.counters.record_rejected();
            return Err(AddError::new(task, reason));
        }

        task.reset_waiting();
        self.free_memory -= task.memory();
        self.scheduler.push(id, task.total());
        debug!(
            "lane {}: admitted task {} ({}) duration={} memory={}",
            self.id,
            id,
            task.name(),
            task.total(),
            task.memory()
        );
        self.tasks.insert(id, task);
        self.counters.record_admitted();
        Ok(id)
    }

    /// Kill a waiting or running task. It ends in `Error` and its memory
    /// is released. Unknown and already finished ids are an error.
    pub fn kill(&mut self, id: TaskId) -> Result<(), LaneError> {
        if self.running == Some(id) {
            self.running = None;
            self.slice_used = 0;
        } else if !self.scheduler.remove(id) {
            return Err(LaneError::UnknownTask(id));
        }
        let Some(task) = self.tasks.get_mut(&id) else {
            unreachable!("queued task {} missing from arena", id);
        };
        task.kill();
        self.free_memory += task.memory();
        self.finished.push(id);
        self.counters.record_killed();
        debug!("lane {}: killed task {}", self.id, id);
        Ok(())
    }

    /// Let `delta` units of simulated time pass. Returns the ids of tasks
    /// that completed during this call, in completion order.
    pub fn advance(&mut self, delta: u64) -> Vec<TaskId> {
        let mut completed = Vec::new();
        if delta == 0 || (self.running.is_none() && !self.scheduler.is_runnable()) {
            return completed;
        }
        let quantum = self.scheduler.quantum();
        let mut left = delta;
        while left > 0 {
            let id = match self.running {
                Some(id) => id,
                None => match self.dispatch() {
                    Some(id) => id,
                    None => break,
                },
            };
            let Some(task) = self.tasks.get_mut(&id) else {
                unreachable!("running task {} missing from arena", id);
            };

            let mut step = left.min(task.remaining());
            if let Some(quantum) = quantum {
                step = step.min(quantum - self.slice_used);
            }
            task.run(step);
            left -= step;
            self.clock += step;
            self.slice_used += step;

            if task.status() == TaskStatus::Done {
                self.free_memory += task.memory();
                self.running = None;
                self.slice_used = 0;
                self.finished.push(id);
                self.counters.record_completed();
                completed.push(id);
                debug!("lane {}: task {} done at {}", self.id, id, self.clock);
            } else if quantum.is_some_and(|q| self.slice_used >= q) {
                task.block();
                self.scheduler.push(id, task.total());
                self.running = None;
                self.slice_used = 0;
                self.counters.record_preempt();
            }
        }
        trace!(
            "lane {}: advanced {} (idle {}), {} completed, {} waiting",
            self.id,
            delta,
            left,
            completed.len(),
            self.scheduler.len()
        );
        completed
    }

    /// Move the next task chosen by the policy into the running slot.
    fn dispatch(&mut self) -> Option<TaskId> {
        let id = self.scheduler.pop()?;
        let Some(task) = self.tasks.get_mut(&id) else {
            unreachable!("queued task {} missing from arena", id);
        };
        // a zero-duration task finishes right here
        task.run(0);
        self.running = Some(id);
        self.slice_used = 0;
        self.counters.record_dispatch();
        debug!("lane {}: dispatched task {}", self.id, id);
        Some(id)
    }

    /// Drop the record of a terminated task. Waiting and running tasks are
    /// never released.
    pub fn release(&mut self, id: TaskId) -> Option<Task> {
        if !self.tasks.get(&id)?.is_terminal() {
            return None;
        }
        self.tasks.remove(&id)
    }

    pub fn id(&self) -> LaneId {
        self.id
    }
    pub fn policy(&self) -> PolicyKind {
        self.policy
    }
    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }
    pub fn free_memory(&self) -> u64 {
        self.free_memory
    }
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Snapshot of the running task.
    pub fn running(&self) -> Option<Task> {
        self.running.and_then(|id| self.tasks.get(&id)).cloned()
    }

    /// Snapshot of every task record, ordered by id.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks = self.tasks.values().cloned().collect::<Vec<_>>();
        tasks.sort_by_key(|t| t.id());
        tasks
    }

    /// Waiting ids in queue order.
    pub fn waiting(&self) -> Vec<TaskId> {
        self.scheduler.queued()
    }

    /// Terminated ids in the order they finished.
    pub fn finished(&self) -> &[TaskId] {
        &self.finished
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }
    pub fn num_waiting(&self) -> usize {
        self.scheduler.len()
    }
    pub fn num_finished(&self) -> usize {
        self.finished.len()
    }
    pub fn is_idle(&self) -> bool {
        self.running.is_none() && !self.scheduler.is_runnable()
    }

    pub fn stats(&self) -> LaneStats {
        LaneStats {
            id: self.id,
            policy: self.policy,
            tasks: self.tasks.len(),
            waiting: self.scheduler.len(),
            finished: self.finished.len(),
            running: self.running.is_some(),
            total_memory: self.total_memory,
            free_memory: self.free_memory,
            clock: self.clock,
            counters: self.counters,
        }
    }
}

impl std::fmt::Debug for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("running", &self.running)
            .field("waiting", &self.scheduler.queued())
            .field("finished", &self.finished)
            .field("free_memory", &self.free_memory)
            .field("total_memory", &self.total_memory)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::IdGen;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn lane(policy: PolicyKind, memory: u64) -> (Lane, IdGen) {
        (Lane::new(0, policy, memory), IdGen::new())
    }

    fn add(lane: &mut Lane, ids: &IdGen, total: u64, memory: u64) -> TaskId {
        let task = Task::new(ids.next(), "task", total, memory);
        lane.add(task).unwrap()
    }

    fn in_use(lane: &Lane) -> u64 {
        lane.tasks()
            .iter()
            .filter(|t| !t.is_terminal())
            .map(|t| t.memory())
            .sum()
    }

    #[test]
    fn test_add_reserves_memory() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 100);
        let a = add(&mut lane, &ids, 5, 40);
        let b = add(&mut lane, &ids, 5, 60);
        assert_eq!(lane.free_memory(), 0);
        assert_eq!(lane.waiting(), vec![a, b]);
        assert_eq!(lane.num_tasks(), 2);
        assert_eq!(lane.task(a).unwrap().status(), TaskStatus::Waiting);
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let (mut lane, ids) = lane(PolicyKind::RoundRobin, 50);
        let a = add(&mut lane, &ids, 5, 30);
        lane.advance(1);
        let before_tasks = lane.tasks();
        let before_waiting = lane.waiting();
        let before_running = lane.running();
        let before_free = lane.free_memory();

        let big = Task::new(ids.next(), "big", 3, 21);
        let err = lane.add(big.clone()).unwrap_err();
        assert_eq!(
            *err.reason(),
            LaneError::InsufficientMemory {
                lane: 0,
                task: big.id(),
                needed: 21,
                free: 20
            }
        );
        // caller gets its task back, untouched
        assert_eq!(err.into_task(), big);

        assert_eq!(lane.tasks(), before_tasks);
        assert_eq!(lane.waiting(), before_waiting);
        assert_eq!(lane.running(), before_running);
        assert_eq!(lane.free_memory(), before_free);
        assert_eq!(lane.running().unwrap().id(), a);
        assert_eq!(lane.stats().counters.rejected, 1);
    }

    #[test]
    fn test_add_rejects_duplicates_and_terminated() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 100);
        let task = Task::new(ids.next(), "dup", 2, 1);
        lane.add(task.clone()).unwrap();
        let err = lane.add(task).unwrap_err();
        assert!(matches!(err.reason(), LaneError::DuplicateTask(_)));

        let mut dead = Task::new(ids.next(), "dead", 2, 1);
        dead.kill();
        let err = lane.add(dead).unwrap_err();
        assert!(matches!(err.reason(), LaneError::TerminatedTask(_)));
        assert_eq!(lane.free_memory(), 99);
    }

    #[test]
    fn test_add_forces_waiting() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 100);
        let mut task = Task::new(ids.next(), "early", 4, 1);
        task.run(1);
        assert_eq!(task.status(), TaskStatus::Running);
        let id = lane.add(task).unwrap();
        assert_eq!(lane.task(id).unwrap().status(), TaskStatus::Waiting);
    }

    #[test]
    fn test_fifo_order() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 100);
        let a = add(&mut lane, &ids, 4, 10);
        let b = add(&mut lane, &ids, 1, 10);
        let c = add(&mut lane, &ids, 2, 10);

        assert_eq!(lane.advance(100), vec![a, b, c]);
        assert_eq!(lane.finished(), &[a, b, c]);
        assert_eq!(lane.free_memory(), 100);
        assert!(lane.is_idle());
        // 7 units of work, the rest of the advance was idle
        assert_eq!(lane.clock(), 7);
    }

    #[test]
    fn test_fifo_runs_to_completion() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 100);
        let a = add(&mut lane, &ids, 5, 10);
        let b = add(&mut lane, &ids, 5, 10);

        assert!(lane.advance(3).is_empty());
        assert_eq!(lane.running().unwrap().id(), a);
        assert_eq!(lane.task(a).unwrap().remaining(), 2);
        assert_eq!(lane.task(b).unwrap().remaining(), 5);

        // a finishes, b starts in the same advance
        assert_eq!(lane.advance(3), vec![a]);
        assert_eq!(lane.running().unwrap().id(), b);
        assert_eq!(lane.task(b).unwrap().remaining(), 4);
    }

    #[test]
    fn test_round_robin_fairness() {
        let (mut lane, ids) = lane(PolicyKind::RoundRobin, 100);
        let a = add(&mut lane, &ids, 6, 10);
        let b = add(&mut lane, &ids, 6, 10);

        assert!(lane.advance(2).is_empty());
        assert_eq!(lane.task(a).unwrap().remaining(), 4);
        assert_eq!(lane.task(b).unwrap().remaining(), 6);

        assert!(lane.advance(2).is_empty());
        assert_eq!(lane.task(b).unwrap().remaining(), 4);
        assert_eq!(lane.task(a).unwrap().remaining(), 4);
        assert_eq!(lane.task(a).unwrap().status(), TaskStatus::Waiting);
        assert!(lane.waiting().contains(&a));

        let mut completed = Vec::new();
        for _ in 0..4 {
            completed.extend(lane.advance(2));
        }
        assert_eq!(completed, vec![a, b]);
        assert_eq!(lane.clock(), 12);
        assert_eq!(lane.stats().counters.preempted, 4);
    }

    #[test]
    fn test_round_robin_in_one_advance() {
        let (mut lane, ids) = lane(PolicyKind::RoundRobin, 100);
        let a = add(&mut lane, &ids, 6, 10);
        let b = add(&mut lane, &ids, 6, 10);
        let c = add(&mut lane, &ids, 1, 10);
        // a(2) b(2) c(1, done) a(2) b(2) a(2, done) b(2, done)
        assert_eq!(lane.advance(13), vec![c, a, b]);
    }

    #[test]
    fn test_round_robin_partial_quantum_carries_over() {
        let (mut lane, ids) = lane(PolicyKind::RoundRobin, 100);
        let a = add(&mut lane, &ids, 6, 10);
        let b = add(&mut lane, &ids, 6, 10);

        // one unit at a time: a keeps the lane for a full quantum
        lane.advance(1);
        assert_eq!(lane.running().unwrap().id(), a);
        lane.advance(1);
        assert_eq!(lane.task(a).unwrap().remaining(), 4);
        assert_eq!(lane.running(), None);
        assert_eq!(lane.waiting(), vec![b, a]);

        lane.advance(1);
        assert_eq!(lane.running().unwrap().id(), b);
        // finishes b's quantum, then one unit of a
        lane.advance(2);
        assert_eq!(lane.task(b).unwrap().remaining(), 4);
        assert_eq!(lane.running().unwrap().id(), a);
        assert_eq!(lane.task(a).unwrap().remaining(), 3);
    }

    #[test]
    fn test_round_robin_lanes_do_not_share_quantum() {
        let ids = IdGen::new();
        let mut first = Lane::new(0, PolicyKind::RoundRobin, 10);
        let mut second = Lane::new(1, PolicyKind::RoundRobin, 10);
        let a = add(&mut first, &ids, 6, 1);
        let x = add(&mut second, &ids, 6, 1);
        let y = add(&mut second, &ids, 6, 1);

        first.advance(1);
        // second lane starts its own full quantum
        second.advance(2);
        assert_eq!(second.task(x).unwrap().remaining(), 4);
        assert_eq!(second.waiting(), vec![y, x]);
        assert_eq!(first.running().unwrap().id(), a);
    }

    #[test]
    fn test_shortest_first_selection() {
        let (mut lane, ids) = lane(PolicyKind::ShortestFirst, 100);
        let a = add(&mut lane, &ids, 10, 10);
        let b = add(&mut lane, &ids, 3, 10);
        let c = add(&mut lane, &ids, 7, 10);

        lane.advance(1);
        assert_eq!(lane.running().unwrap().id(), b);
        assert_eq!(lane.advance(100), vec![b, c, a]);
    }

    #[test]
    fn test_shortest_first_is_not_preemptive() {
        let (mut lane, ids) = lane(PolicyKind::ShortestFirst, 100);
        let long = add(&mut lane, &ids, 10, 10);
        lane.advance(1);
        let short = add(&mut lane, &ids, 1, 10);
        // the long task keeps the lane
        assert_eq!(lane.advance(9), vec![long]);
        assert_eq!(lane.advance(1), vec![short]);
    }

    #[test]
    fn test_kill_running_and_waiting() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 100);
        let a = add(&mut lane, &ids, 5, 30);
        let b = add(&mut lane, &ids, 5, 20);
        let c = add(&mut lane, &ids, 5, 10);
        lane.advance(2);
        assert_eq!(lane.free_memory(), 40);

        lane.kill(a).unwrap();
        assert_eq!(lane.running(), None);
        assert_eq!(lane.free_memory(), 70);
        assert_eq!(lane.task(a).unwrap().status(), TaskStatus::Error);
        assert_eq!(lane.task(a).unwrap().remaining(), 0);

        lane.kill(c).unwrap();
        assert_eq!(lane.waiting(), vec![b]);
        assert_eq!(lane.free_memory(), 80);
        assert_eq!(lane.finished(), &[a, c]);

        // b picks up where a left off, and the killed task is not reported
        assert_eq!(lane.advance(10), vec![b]);
        assert_eq!(lane.finished(), &[a, c, b]);
        assert_eq!(lane.free_memory(), 100);
    }

    #[test]
    fn test_kill_is_idempotent() {
        let (mut lane, ids) = lane(PolicyKind::RoundRobin, 100);
        let a = add(&mut lane, &ids, 5, 30);
        assert_eq!(lane.kill(a), Ok(()));
        assert_eq!(lane.kill(a), Err(LaneError::UnknownTask(a)));
        assert_eq!(lane.task(a).unwrap().status(), TaskStatus::Error);
        assert_eq!(lane.free_memory(), 100);
        assert_eq!(lane.finished(), &[a]);
    }

    #[test]
    fn test_kill_unknown_and_done() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 100);
        assert_eq!(lane.kill(42), Err(LaneError::UnknownTask(42)));
        let a = add(&mut lane, &ids, 1, 30);
        lane.advance(1);
        assert_eq!(lane.kill(a), Err(LaneError::UnknownTask(a)));
        assert_eq!(lane.task(a).unwrap().status(), TaskStatus::Done);
    }

    #[test]
    fn test_kill_resets_quantum() {
        let (mut lane, ids) = lane(PolicyKind::RoundRobin, 100);
        let a = add(&mut lane, &ids, 6, 10);
        let b = add(&mut lane, &ids, 6, 10);
        lane.advance(1);
        lane.kill(a).unwrap();
        // b gets a full quantum
        lane.advance(2);
        assert_eq!(lane.task(b).unwrap().remaining(), 4);
        assert_eq!(lane.running(), None);
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let (mut lane, ids) = lane(PolicyKind::RoundRobin, 100);
        let a = add(&mut lane, &ids, 6, 10);
        let _b = add(&mut lane, &ids, 6, 10);
        let before = lane.tasks();
        let waiting = lane.waiting();
        assert!(lane.advance(0).is_empty());
        assert_eq!(lane.tasks(), before);
        assert_eq!(lane.waiting(), waiting);
        assert_eq!(lane.running(), None);

        lane.advance(1);
        let before = lane.tasks();
        assert!(lane.advance(0).is_empty());
        assert_eq!(lane.tasks(), before);
        assert_eq!(lane.running().unwrap().id(), a);
    }

    #[test]
    fn test_advance_on_empty_lane() {
        let mut lane = Lane::new(0, PolicyKind::ShortestFirst, 0);
        assert!(lane.advance(10).is_empty());
        assert_eq!(lane.clock(), 0);
        assert!(lane.is_idle());
    }

    #[test]
    fn test_zero_duration_task() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 10);
        let a = add(&mut lane, &ids, 0, 5);
        let b = add(&mut lane, &ids, 1, 5);
        assert_eq!(lane.advance(1), vec![a, b]);
        assert_eq!(lane.free_memory(), 10);
    }

    #[test]
    fn test_release() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 10);
        let a = add(&mut lane, &ids, 1, 5);
        let b = add(&mut lane, &ids, 5, 5);
        assert!(lane.release(a).is_none());
        lane.advance(1);
        let task = lane.release(a).unwrap();
        assert_eq!(task.status(), TaskStatus::Done);
        assert!(lane.task(a).is_none());
        assert!(lane.release(b).is_none());
        // finished keeps the history
        assert_eq!(lane.finished(), &[a]);
    }

    #[test]
    fn test_with_code() {
        let lane = Lane::with_code(3, 1, 10).unwrap();
        assert_eq!(lane.policy(), PolicyKind::RoundRobin);
        assert_eq!(lane.id(), 3);
        assert_eq!(
            Lane::with_code(3, 7, 10).unwrap_err(),
            LaneError::InvalidPolicy(7)
        );
    }

    #[test]
    fn test_stats() {
        let (mut lane, ids) = lane(PolicyKind::Fifo, 10);
        add(&mut lane, &ids, 1, 5);
        add(&mut lane, &ids, 5, 5);
        lane.advance(2);
        let stats = lane.stats();
        assert_eq!(stats.tasks, 2);
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.finished, 1);
        assert!(stats.running);
        assert_eq!(stats.free_memory, 5);
        assert_eq!(stats.counters.admitted, 2);
        assert_eq!(stats.counters.dispatched, 2);
        assert_eq!(stats.counters.completed, 1);
    }

    #[test]
    fn test_memory_invariant_random_ops() {
        let mut rng = StdRng::seed_from_u64(7);
        for policy in PolicyKind::ALL {
            let (mut lane, ids) = lane(policy, 200);
            let mut known = Vec::new();
            let mut reported = Vec::new();
            for _ in 0..2_000 {
                match rng.gen_range(0..10) {
                    0..=3 => {
                        let task =
                            Task::new(ids.next(), "r", rng.gen_range(0..12), rng.gen_range(0..60));
                        if let Ok(id) = lane.add(task) {
                            known.push(id);
                        }
                    }
                    4 if !known.is_empty() => {
                        let id = known[rng.gen_range(0..known.len())];
                        let _ = lane.kill(id);
                    }
                    _ => reported.extend(lane.advance(rng.gen_range(0..5))),
                }
                assert_eq!(lane.free_memory() + in_use(&lane), lane.total_memory());
                assert!(lane.running().map_or(true, |t| t.status() == TaskStatus::Running));
                for task in lane.tasks() {
                    assert!(task.remaining() <= task.total());
                }
            }
            // every reported id is done, each exactly once, in finish order
            let done = lane
                .finished()
                .iter()
                .copied()
                .filter(|id| lane.task(*id).unwrap().status() == TaskStatus::Done)
                .collect::<Vec<_>>();
            assert_eq!(reported, done);
        }
    }
}
