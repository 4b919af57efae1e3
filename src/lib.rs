#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::many_single_char_names)]

//! Pose-computing operator graph for rigid-body rigs: CCD and two-bone IK,
//! algebraic mechanisms, keyframe tracks with undo/redo, and attachment
//! constraints.

pub mod animation;
pub mod errors;
pub mod graph;
pub mod kinematics;
pub mod math;
pub mod mechanisms;
pub mod settings;
pub mod undo;

pub use animation::{InterpolationMode, KeyframeTrack, TrackData, TrackSampler, TrackValue};
pub use errors::{Result, RigError};
pub use graph::{EvalContext, Operator, OperatorGraph, OperatorKey, OperatorNode, ParamKey, PortValue, TrackKey};
pub use kinematics::{AttachmentConstraint, IkSolver, TriangleIkSolver};
pub use math::{Axis, Color, Pose};
pub use mechanisms::{ExplodePart, ExplodePartsOperator, Gear, GearsOperator, Piston, PistonOperator, RamAndPistonOperator};
pub use settings::GraphSettings;
pub use undo::UndoRedoManager;
