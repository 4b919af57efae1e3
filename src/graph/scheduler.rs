//! Cooperative Timer Queue
//!
//! Periodic drivers (RPM parameters) are scheduled tasks, not threads or
//! callbacks capturing their operator. The host advances the queue from the
//! frame thread; fired ticks are dispatched to the owning operator's
//! [`Operator::on_timer`](crate::graph::Operator::on_timer).
//!
//! Every task is owned by exactly one operator through a [`TaskHandle`]. The
//! handle is cancelled in `detach` and `destroy`, and the graph purges all tasks
//! of an operator when it is removed, so no tick can reach a dead operator.

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::graph::{OperatorKey, TaskKey};

#[derive(Debug, Clone)]
struct ScheduledTask {
    owner: OperatorKey,
    period: f64,
    accumulated: f64,
}

/// A due task returned by [`Scheduler::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTask {
    pub task: TaskKey,
    pub owner: OperatorKey,
    pub ticks: u32,
}

#[derive(Debug)]
pub struct Scheduler {
    tasks: SlotMap<TaskKey, ScheduledTask>,
    period: f64,
    max_catch_up_ticks: u32,
}

impl Scheduler {
    /// Creates a queue whose tasks tick every `period` seconds.
    #[must_use]
    pub fn new(period: f64, max_catch_up_ticks: u32) -> Self {
        Self {
            tasks: SlotMap::with_key(),
            period,
            max_catch_up_ticks: max_catch_up_ticks.max(1),
        }
    }

    /// Default tick period in seconds.
    #[inline]
    #[must_use]
    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn schedule(&mut self, owner: OperatorKey) -> TaskKey {
        let key = self.tasks.insert(ScheduledTask {
            owner,
            period: self.period,
            accumulated: 0.0,
        });
        log::debug!("Scheduled task {key:?} for operator {owner:?}");
        key
    }

    /// Returns `true` if the task was live.
    pub fn cancel(&mut self, task: TaskKey) -> bool {
        let removed = self.tasks.remove(task).is_some();
        if removed {
            log::debug!("Cancelled task {task:?}");
        }
        removed
    }

    /// Cancels every task owned by `owner`, returning how many were live.
    pub fn cancel_owned_by(&mut self, owner: OperatorKey) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| task.owner != owner);
        before - self.tasks.len()
    }

    #[inline]
    #[must_use]
    pub fn is_scheduled(&self, task: TaskKey) -> bool {
        self.tasks.contains_key(task)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn tasks_owned_by(&self, owner: OperatorKey) -> usize {
        self.tasks.values().filter(|task| task.owner == owner).count()
    }

    /// Advances every task by `dt` seconds and returns the due ones.
    pub fn advance(&mut self, dt: f64) -> SmallVec<[FiredTask; 4]> {
        let mut fired = SmallVec::new();
        if dt <= 0.0 || !dt.is_finite() {
            return fired;
        }

        for (key, task) in &mut self.tasks {
            task.accumulated += dt;
            let due = (task.accumulated / task.period).floor();
            if due < 1.0 {
                continue;
            }
            task.accumulated -= due * task.period;

            let ticks = if due > f64::from(self.max_catch_up_ticks) {
                log::debug!("Task {key:?} dropped {} ticks", due as u64 - u64::from(self.max_catch_up_ticks));
                self.max_catch_up_ticks
            } else {
                due as u32
            };

            fired.push(FiredTask {
                task: key,
                owner: task.owner,
                ticks,
            });
        }

        fired
    }
}

/// Operator-owned handle to at most one scheduled task.
///
/// Intentionally not `Clone`: a task has one owner.
#[derive(Debug, Default)]
pub struct TaskHandle {
    task: Option<TaskKey>,
}

impl TaskHandle {
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<TaskKey> {
        self.task
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    #[inline]
    #[must_use]
    pub fn owns(&self, task: TaskKey) -> bool {
        self.task == Some(task)
    }

    /// Schedules a task unless one is already held.
    pub fn start(&mut self, scheduler: &mut Scheduler, owner: OperatorKey) {
        if let Some(task) = self.task {
            if scheduler.is_scheduled(task) {
                return;
            }
        }
        self.task = Some(scheduler.schedule(owner));
    }

    pub fn cancel(&mut self, scheduler: &mut Scheduler) {
        if let Some(task) = self.task.take() {
            scheduler.cancel(task);
        }
    }
}
