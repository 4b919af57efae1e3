use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::graph::{EvalContext, Operator, OperatorVariant};
use crate::math::{shortest_arc, Pose, EPSILON};

/// Bind-time geometry of a two-bone chain.
#[derive(Debug, Clone, Copy, Default)]
struct TriangleBind {
    /// Joint0 → joint1 distance.
    upper: f64,
    /// Joint1 → tip distance.
    lower: f64,
    /// Joint1 relative to joint0.
    joint1_local: Pose,
    /// Direction from joint1 to the tip, in joint1's frame.
    tip_dir_local: DVec3,
    /// Bend axis in joint0's frame, used when the chain is straight.
    bend_axis_local: DVec3,
}

/// Closed-form solver for a two-bone chain (law of cosines).
///
/// Joint0 follows the host-written base value of its output; the solver
/// only rotates it. Targets out of reach produce the most-reachable pose.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TriangleIkSolver {
    #[serde(default)]
    enabled: bool,
    #[serde(skip)]
    bind: Option<TriangleBind>,
}

impl TriangleIkSolver {
    pub const TARGET: usize = 0;
    pub const JOINT0: usize = 0;
    pub const JOINT1: usize = 1;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bone lengths captured at bind time.
    #[must_use]
    pub fn bone_lengths(&self) -> Option<(f64, f64)> {
        self.bind.map(|bind| (bind.upper, bind.lower))
    }

    fn solve(bind: &TriangleBind, joint0: Pose, target: DVec3) -> Option<(Pose, Pose)> {
        let root = joint0.translation;
        let to_target = target - root;
        let distance = to_target.length();
        if distance < EPSILON {
            return None;
        }

        let joint1 = joint0 * bind.joint1_local;
        let bone = joint1.translation - root;
        let (a, b) = (bind.upper, bind.lower);

        let raw_cos = (a * a + distance * distance - b * b) / (2.0 * a * distance);
        if !(-1.0..=1.0).contains(&raw_cos) {
            log::warn!("Two-bone target out of reach (distance {distance:.4}, bones {a:.4} + {b:.4})");
        }
        let desired = raw_cos.clamp(-1.0, 1.0).acos();
        let current = bone.angle_between(to_target);

        let bend = bone
            .cross(to_target)
            .try_normalize()
            .or_else(|| {
                let fallback = joint0.orientation * bind.bend_axis_local;
                (fallback - bone.normalize_or_zero() * fallback.dot(bone.normalize_or_zero())).try_normalize()
            })
            .unwrap_or_else(|| bone.try_normalize().map_or(DVec3::Z, DVec3::any_orthonormal_vector));

        let swing = DQuat::from_axis_angle(bend, current - desired);
        let joint0 = Pose {
            orientation: (swing * joint0.orientation).normalize(),
            ..joint0
        };

        let mut joint1 = joint0 * bind.joint1_local;
        let tip_dir = joint1.orientation * bind.tip_dir_local;
        if let Some(aim) = shortest_arc(tip_dir, target - joint1.translation) {
            joint1.orientation = (aim * joint1.orientation).normalize();
        }

        (joint0.is_finite() && joint1.is_finite()).then_some((joint0, joint1))
    }
}

impl Operator for TriangleIkSolver {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn input_names(&self) -> Vec<String> {
        vec!["Target".to_string()]
    }

    fn output_names(&self) -> Vec<String> {
        vec!["Joint0".to_string(), "Joint1".to_string()]
    }

    fn enable(&mut self, ctx: &mut EvalContext<'_>) {
        self.enabled = true;
        let (Some(joint0), Some(joint1), Some(target)) = (
            ctx.output_pose(Self::JOINT0),
            ctx.output_pose(Self::JOINT1),
            ctx.input_pose(Self::TARGET),
        ) else {
            log::warn!("Two-bone solver {:?} is not fully connected; not bound", ctx.operator());
            self.bind = None;
            return;
        };

        let tip = target.translation;
        let upper_vec = joint1.translation - joint0.translation;
        let lower_vec = tip - joint1.translation;
        let bend_world = upper_vec
            .cross(lower_vec)
            .try_normalize()
            .unwrap_or_else(|| upper_vec.try_normalize().map_or(DVec3::Z, DVec3::any_orthonormal_vector));

        self.bind = Some(TriangleBind {
            upper: upper_vec.length(),
            lower: lower_vec.length(),
            joint1_local: joint0.inverse() * joint1,
            tip_dir_local: (joint1.orientation.inverse() * lower_vec).normalize_or_zero(),
            bend_axis_local: joint0.orientation.inverse() * bend_world,
        });
        log::debug!("Two-bone solver bound: bones {:.4} / {:.4}", upper_vec.length(), lower_vec.length());
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn requires_bind(&self) -> bool {
        self.enabled
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        let Some(bind) = self.bind.filter(|_| self.enabled) else {
            ctx.pass_through();
            return;
        };
        let (Some(joint0), Some(target)) = (ctx.output_pose(Self::JOINT0), ctx.input_pose(Self::TARGET)) else {
            ctx.pass_through();
            return;
        };

        match Self::solve(&bind, joint0, target.translation) {
            Some((joint0, joint1)) => {
                ctx.set_clean(Self::JOINT0, joint0);
                ctx.set_clean(Self::JOINT1, joint1);
            }
            None => log::warn!("Two-bone solver {:?}: degenerate target; holding previous pose", ctx.operator()),
        }
    }
}
