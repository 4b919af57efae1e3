use serde::{Deserialize, Serialize};

use crate::graph::{OperatorKey, Scheduler, TaskHandle, TaskKey};

/// Turns an RPM parameter into revolutions through a periodic task.
///
/// The task runs only while `rpm` is non-zero. Its handle is owned here and
/// must be cancelled when the operator detaches or is destroyed.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RpmDriver {
    #[serde(default)]
    pub rpm: f64,
    #[serde(skip)]
    task: TaskHandle,
}

impl RpmDriver {
    #[must_use]
    pub fn new(rpm: f64) -> Self {
        Self {
            rpm,
            task: TaskHandle::default(),
        }
    }

    /// Starts or stops the task to match `rpm`.
    pub fn sync(&mut self, scheduler: &mut Scheduler, owner: OperatorKey) {
        if self.rpm != 0.0 && self.rpm.is_finite() {
            self.task.start(scheduler, owner);
        } else {
            self.task.cancel(scheduler);
        }
    }

    pub fn cancel(&mut self, scheduler: &mut Scheduler) {
        self.task.cancel(scheduler);
    }

    #[inline]
    #[must_use]
    pub fn owns(&self, task: TaskKey) -> bool {
        self.task.owns(task)
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_active()
    }

    /// Revolutions covered in `elapsed` seconds.
    #[inline]
    #[must_use]
    pub fn revolutions_in(&self, elapsed: f64) -> f64 {
        self.rpm / 60.0 * elapsed
    }
}
