use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::graph::{EvalContext, Operator, OperatorGraph, OperatorKey, OperatorVariant, ParamKey};
use crate::math::Pose;

/// A parent the constrained part is attached to from `activation_time` on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachTarget {
    pub activation_time: f64,
    /// Part pose relative to the target, captured on first activation.
    #[serde(skip)]
    offset: Option<Pose>,
}

impl AttachTarget {
    #[must_use]
    pub fn new(activation_time: f64) -> Self {
        Self {
            activation_time,
            offset: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> Option<Pose> {
        self.offset
    }
}

/// Re-parents a part between time-windowed targets without a jump.
///
/// The active target at time `t` is the one with the latest activation time
/// not after `t`. When a target becomes active for the first time, its offset
/// is chosen so the attached pose is continuous across the switch.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AttachmentConstraint {
    targets: Vec<AttachTarget>,
    #[serde(skip)]
    active: Option<usize>,
}

impl AttachmentConstraint {
    pub const TIME: usize = 0;
    pub const ATTACHED: usize = 0;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[AttachTarget] {
        &self.targets
    }

    /// Index of the target active at `time`.
    #[inline]
    #[must_use]
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Adds a target. Returns the input index its pose should be connected to.
    ///
    /// Targets are expected in activation order. Cached offsets of all
    /// targets are cleared.
    pub fn add_attach_target(&mut self, activation_time: f64) -> usize {
        if let Some(last) = self.targets.last()
            && activation_time < last.activation_time
        {
            log::warn!(
                "Attach target at {activation_time} added after one at {}; targets must be in activation order",
                last.activation_time
            );
        }
        self.targets.push(AttachTarget::new(activation_time));
        self.clear_offsets();
        self.targets.len()
    }

    pub fn clear_offsets(&mut self) {
        for target in &mut self.targets {
            target.offset = None;
        }
        self.active = None;
    }

    /// Adds a target to a constraint in `graph` and connects its pose input.
    pub fn add_target_to(
        graph: &mut OperatorGraph,
        constraint: OperatorKey,
        pose: ParamKey,
        activation_time: f64,
    ) -> Result<usize> {
        let input = graph.modify_operator::<AttachmentConstraint, _>(constraint, |c| c.add_attach_target(activation_time))?;
        graph.connect_input(constraint, input, pose)?;
        Ok(input)
    }

    /// Latest target whose activation time is not after `time`. Ties go to the
    /// target added last.
    #[must_use]
    pub fn find_target(&self, time: f64) -> Option<usize> {
        self.targets
            .partition_point(|target| target.activation_time <= time)
            .checked_sub(1)
    }

    fn target_input(index: usize) -> usize {
        index + 1
    }
}

impl Operator for AttachmentConstraint {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn input_names(&self) -> Vec<String> {
        std::iter::once("Time".to_string())
            .chain((0..self.targets.len()).map(|i| format!("Target{i}")))
            .collect()
    }

    fn output_names(&self) -> Vec<String> {
        vec!["Attached".to_string()]
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        if !ctx.is_output_connected(Self::ATTACHED) {
            return;
        }
        let time = ctx.input_scalar(Self::TIME).unwrap_or(0.0);
        let Some(index) = self.find_target(time) else {
            self.active = None;
            ctx.pass_through();
            return;
        };
        let Some(target) = ctx.input_pose(Self::target_input(index)) else {
            ctx.pass_through();
            return;
        };

        let offset = match self.targets[index].offset {
            Some(offset) => offset,
            None => {
                let previous = self
                    .active
                    .filter(|&prev| prev != index)
                    .and_then(|prev| {
                        let prev_offset = self.targets[prev].offset?;
                        let prev_target = ctx.input_pose(Self::target_input(prev))?;
                        Some(prev_target * prev_offset)
                    });
                let attached = previous.unwrap_or_else(|| ctx.output_pose(Self::ATTACHED).unwrap_or(Pose::IDENTITY));
                let offset = target.inverse() * attached;
                self.targets[index].offset = Some(offset);
                log::debug!("Attachment switched to target {index} at time {time}");
                offset
            }
        };

        self.active = Some(index);
        ctx.set_clean(Self::ATTACHED, target * offset);
    }
}
