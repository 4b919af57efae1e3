//! Operator Trait
//!
//! Defines the abstract interface of a node in the operator graph.
//! Each operator computes one or more output values from its inputs and its
//! own parameters.

use crate::graph::context::EvalContext;
use crate::graph::scheduler::Scheduler;
use crate::graph::{OperatorKey, TaskKey, TrackKey};

/// Operator Trait
///
/// All pose-computing nodes implement this interface.
///
/// # Ports
/// - `input_names` / `output_names` describe the port layout. The graph re-reads
///   them after every [`modify_operator`](crate::graph::OperatorGraph::modify_operator)
///   call, so operators may grow ports (adding a joint adds an output).
/// - Port indices are positional and stable for existing ports.
///
/// # Evaluation
/// - `evaluate` receives an [`EvalContext`] giving pull access to inputs and
///   write access to outputs. Writing to an unconnected output is a no-op.
/// - Operators must not block. Degenerate geometry is handled by not writing
///   the affected output (the graph holds its previous value) and logging.
///
/// # Lifecycle
/// - `enable` captures bind-time state (solvers).
/// - `sync_schedule` starts or stops periodic drivers to match the operator's
///   parameters; `detach` and `destroy` must cancel them.
pub trait Operator {
    /// Stable type name, used in logs and error reports.
    fn type_name(&self) -> &'static str;

    fn input_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn output_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>);

    /// Captures bind-time state from the current port values.
    fn enable(&mut self, _ctx: &mut EvalContext<'_>) {}

    /// Switches the operator to pass-through.
    fn disable(&mut self) {}

    /// Whether bind-time state must be re-captured after loading from JSON.
    fn requires_bind(&self) -> bool {
        false
    }

    /// The keyframe track whose edits should dirty this operator.
    fn watched_track(&self) -> Option<TrackKey> {
        None
    }

    fn set_watched_track(&mut self, _track: Option<TrackKey>) {}

    /// Reconciles periodic tasks with the operator's current parameters.
    fn sync_schedule(&mut self, _scheduler: &mut Scheduler, _me: OperatorKey) {}

    /// Called once per fired tick of a task owned by this operator.
    /// Returns `true` when the operator's outputs became stale.
    fn on_timer(&mut self, _task: TaskKey, _elapsed: f64) -> bool {
        false
    }

    /// Suspends periodic tasks.
    fn detach(&mut self, _scheduler: &mut Scheduler) {}

    /// Releases periodic tasks before the operator is dropped.
    fn destroy(&mut self, scheduler: &mut Scheduler) {
        self.detach(scheduler);
    }
}
