//! CCD Chain Solver
//!
//! Cyclic coordinate descent over a chain of hinge joints, root first.
//!
//! Each iteration sweeps the chain from tip to root. At every joint:
//!
//! 1. **Aim**: rotate the joint (and everything below it) so the vector
//!    joint→effector points along joint→target.
//! 2. **Hinge**: bring the joint's configured axis back onto the axis of its
//!    rest frame (parent orientation × bind orientation). Interior joints split
//!    the correction evenly with their parent.
//! 3. **Limit**: measure the twist about the hinge axis relative to the rest
//!    frame and rotate back by exactly the amount outside `[min, max]`.
//!
//! Descendants are carried rigidly, so bind-time bone offsets are preserved.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::Result;
use crate::graph::{EvalContext, Operator, OperatorGraph, OperatorKey, OperatorVariant, ParamKey};
use crate::math::{shortest_arc, twist_angle, Axis, Pose, EPSILON};

/// A hinge joint of an [`IkSolver`] chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IkJoint {
    pub axis: Axis,
    /// `[min, max]` twist about `axis` relative to the rest frame, in radians.
    pub limits: [f64; 2],
    #[serde(skip)]
    bind_local: Pose,
    #[serde(skip)]
    pose: Pose,
}

impl IkJoint {
    #[must_use]
    pub fn new(axis: Axis, limits: [f64; 2]) -> Self {
        Self {
            axis,
            limits,
            bind_local: Pose::IDENTITY,
            pose: Pose::IDENTITY,
        }
    }

    /// Offset from the parent joint (or the chain base) captured at bind time.
    #[inline]
    #[must_use]
    pub fn bind_local(&self) -> Pose {
        self.bind_local
    }

    /// Last solved global pose.
    #[inline]
    #[must_use]
    pub fn pose(&self) -> Pose {
        self.pose
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IkSolver {
    joints: Vec<IkJoint>,
    /// Overrides [`GraphSettings::ik_iterations`](crate::GraphSettings) when set.
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    enabled: bool,
    #[serde(skip)]
    bound: bool,
    /// Bind-time target position in the last joint's frame.
    #[serde(skip)]
    tip_local: DVec3,
}

impl IkSolver {
    pub const BASE: usize = 0;
    pub const TARGET: usize = 1;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    #[inline]
    #[must_use]
    pub fn joints(&self) -> &[IkJoint] {
        &self.joints
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Appends a joint at the tip of the chain. Returns its output index.
    ///
    /// The solver must be re-enabled before the new joint takes part.
    pub fn add_joint(&mut self, axis: Axis, limits: [f64; 2]) -> usize {
        self.joints.push(IkJoint::new(axis, limits));
        self.bound = false;
        self.joints.len() - 1
    }

    /// Adds a joint to a solver in `graph` and binds its output to `pose`.
    /// An enabled solver is re-bound.
    pub fn add_joint_to(
        graph: &mut OperatorGraph,
        solver: OperatorKey,
        pose: ParamKey,
        axis: Axis,
        limits: [f64; 2],
    ) -> Result<usize> {
        let (index, enabled) = graph.modify_operator::<IkSolver, _>(solver, |s| (s.add_joint(axis, limits), s.enabled))?;
        graph.connect_output(solver, index, pose)?;
        if enabled {
            graph.enable_operator(solver)?;
        }
        Ok(index)
    }

    fn parent_orientation(&self, index: usize, base: &Pose) -> DQuat {
        match index {
            0 => base.orientation,
            _ => self.joints[index - 1].pose.orientation,
        }
    }

    fn rest_orientation(&self, index: usize, base: &Pose) -> DQuat {
        self.parent_orientation(index, base) * self.joints[index].bind_local.orientation
    }

    fn effector(&self) -> DVec3 {
        self.joints
            .last()
            .map_or(DVec3::ZERO, |tip| tip.pose.transform_point(self.tip_local))
    }

    fn rotate_subtree(&mut self, index: usize, rotation: DQuat) {
        let pivot = self.joints[index].pose.translation;
        for joint in &mut self.joints[index..] {
            joint.pose.translation = pivot + rotation * (joint.pose.translation - pivot);
            joint.pose.orientation = (rotation * joint.pose.orientation).normalize();
        }
    }

    fn translate_subtree(&mut self, index: usize, delta: DVec3) {
        for joint in &mut self.joints[index..] {
            joint.pose.translation += delta;
        }
    }

    fn aim(&mut self, index: usize, target: DVec3) {
        let pivot = self.joints[index].pose.translation;
        if let Some(rotation) = shortest_arc(self.effector() - pivot, target - pivot) {
            self.rotate_subtree(index, rotation);
        }
    }

    fn enforce_hinge(&mut self, index: usize, base: &Pose) {
        let axis = self.joints[index].axis.to_vec3();
        let rest_axis = self.rest_orientation(index, base) * axis;
        let current_axis = self.joints[index].pose.orientation * axis;
        let Some(correction) = shortest_arc(current_axis, rest_axis) else {
            return;
        };

        let interior = index > 0 && index + 1 < self.joints.len();
        if !interior {
            self.rotate_subtree(index, correction);
            return;
        }

        // Split with the parent: the parent turns half-way back, the joint
        // is re-seated on the parent's bone and turns the other half.
        let half = DQuat::IDENTITY.slerp(correction, 0.5);
        let bone = self.joints[index].bind_local.translation;
        let parent = &mut self.joints[index - 1].pose;
        parent.orientation = (half.inverse() * parent.orientation).normalize();
        let seat = parent.transform_point(bone);
        let delta = seat - self.joints[index].pose.translation;
        self.translate_subtree(index, delta);
        self.rotate_subtree(index, half);
    }

    fn enforce_limits(&mut self, index: usize, base: &Pose) {
        let joint = &self.joints[index];
        let [min, max] = joint.limits;
        let axis = joint.axis.to_vec3();
        let rest = self.rest_orientation(index, base);

        let angle = twist_angle(rest.inverse() * joint.pose.orientation, axis);
        let clamped = angle.max(min).min(max);
        let deficit = clamped - angle;
        if deficit.abs() > EPSILON {
            let world_axis = (rest * axis).normalize();
            self.rotate_subtree(index, DQuat::from_axis_angle(world_axis, deficit));
        }
    }
}

impl Operator for IkSolver {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn input_names(&self) -> Vec<String> {
        vec!["Base".to_string(), "Target".to_string()]
    }

    fn output_names(&self) -> Vec<String> {
        (0..self.joints.len()).map(|i| format!("Joint{i}")).collect()
    }

    fn enable(&mut self, ctx: &mut EvalContext<'_>) {
        let base = ctx.input_pose(Self::BASE).unwrap_or(Pose::IDENTITY);

        let mut poses: SmallVec<[Pose; 8]> = SmallVec::with_capacity(self.joints.len());
        for index in 0..self.joints.len() {
            let Some(pose) = ctx.output_pose(index) else {
                log::warn!("IK solver {:?}: joint {index} is not connected; not bound", ctx.operator());
                self.enabled = true;
                self.bound = false;
                return;
            };
            poses.push(pose);
        }

        let mut parent = base;
        for (joint, pose) in self.joints.iter_mut().zip(&poses) {
            joint.bind_local = parent.inverse() * *pose;
            joint.pose = *pose;
            parent = *pose;
        }

        self.tip_local = match (ctx.input_pose(Self::TARGET), poses.last()) {
            (Some(target), Some(tip)) => tip.inverse().transform_point(target.translation),
            _ => DVec3::ZERO,
        };
        self.enabled = true;
        self.bound = !self.joints.is_empty();
        log::debug!("IK solver bound with {} joint(s)", self.joints.len());
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn requires_bind(&self) -> bool {
        self.enabled
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        if !self.enabled || !self.bound {
            ctx.pass_through();
            return;
        }
        let base = ctx.input_pose(Self::BASE).unwrap_or(Pose::IDENTITY);
        let Some(target) = ctx.input_pose(Self::TARGET) else {
            ctx.pass_through();
            return;
        };
        let target = target.translation;
        let previous: SmallVec<[Pose; 8]> = self.joints.iter().map(|joint| joint.pose).collect();

        let anchor = base.transform_point(self.joints[0].bind_local.translation);
        let delta = anchor - self.joints[0].pose.translation;
        self.translate_subtree(0, delta);

        let iterations = self.iterations.unwrap_or(ctx.settings().ik_iterations);
        for _ in 0..iterations {
            for index in (0..self.joints.len()).rev() {
                self.aim(index, target);
                self.enforce_hinge(index, &base);
                self.enforce_limits(index, &base);
            }
        }

        if self.joints.iter().any(|joint| !joint.pose.is_finite()) {
            log::warn!("IK solver {:?} produced a non-finite pose; holding previous", ctx.operator());
            for (joint, pose) in self.joints.iter_mut().zip(previous) {
                joint.pose = pose;
            }
            return;
        }

        for (index, joint) in self.joints.iter().enumerate() {
            ctx.set_clean(index, joint.pose.normalized());
        }
    }
}
