//! Dataflow substrate: parameters, ports, operators and pull evaluation.

pub mod context;
pub mod document;
pub mod editing;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod operator;
pub mod port;
pub mod registry;
pub mod scheduler;
pub mod value;

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a parameter (value slot) in an [`OperatorGraph`].
    pub struct ParamKey;
    /// Handle to an operator in an [`OperatorGraph`].
    pub struct OperatorKey;
    /// Handle to a keyframe track in an [`OperatorGraph`].
    pub struct TrackKey;
    /// Handle to a scheduled periodic task.
    pub struct TaskKey;
}

pub use context::EvalContext;
pub use document::GraphDocument;
pub use graph::{OperatorFlags, OperatorGraph, OperatorSlot};
pub use operator::Operator;
pub use port::{InputPort, OutputPort, Parameter};
pub use registry::{OperatorNode, OperatorVariant};
pub use scheduler::{FiredTask, Scheduler, TaskHandle};
pub use value::PortValue;
