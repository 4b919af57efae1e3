//! Solvers and constraints that position joints from targets.

pub mod attachment;
pub mod ik_solver;
pub mod triangle_ik;

pub use attachment::{AttachTarget, AttachmentConstraint};
pub use ik_solver::{IkJoint, IkSolver};
pub use triangle_ik::TriangleIkSolver;
