use std::f64::consts::TAU;

use glam::DQuat;
use serde::{Deserialize, Serialize};

use crate::errors::{PortKind, Result, RigError};
use crate::graph::{EvalContext, Operator, OperatorGraph, OperatorKey, OperatorVariant, ParamKey, Scheduler, TaskKey};
use crate::mechanisms::driver::RpmDriver;
use crate::math::Axis;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gear {
    /// Turns of this gear per revolution of the operator.
    pub ratio: f64,
    /// Phase offset, in turns.
    pub offset: f64,
    pub axis: Axis,
}

impl Gear {
    #[must_use]
    pub fn new(ratio: f64, offset: f64, axis: Axis) -> Self {
        Self { ratio, offset, axis }
    }

    /// Rotation of this gear at `revolutions`.
    #[must_use]
    pub fn rotation(&self, revolutions: f64) -> DQuat {
        DQuat::from_axis_angle(self.axis.to_vec3(), TAU * (revolutions * self.ratio + self.offset))
    }
}

/// Rotates a set of coupled gears from one shared revolution count.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GearsOperator {
    gears: Vec<Gear>,
    #[serde(default)]
    pub revolutions: f64,
    #[serde(default)]
    pub driver: RpmDriver,
}

impl GearsOperator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn gears(&self) -> &[Gear] {
        &self.gears
    }

    /// Returns the gear's output index.
    pub fn add_gear(&mut self, gear: Gear) -> usize {
        self.gears.push(gear);
        self.gears.len() - 1
    }

    pub fn gear_mut(&mut self, index: usize) -> Option<&mut Gear> {
        self.gears.get_mut(index)
    }

    /// Adds a gear to an operator in `graph` and binds its output to `pose`.
    pub fn add_gear_to(graph: &mut OperatorGraph, op: OperatorKey, pose: ParamKey, gear: Gear) -> Result<usize> {
        let index = graph.modify_operator::<GearsOperator, _>(op, |g| g.add_gear(gear))?;
        graph.connect_output(op, index, pose)?;
        Ok(index)
    }

    /// Removes a gear together with its output port. Later gears shift down.
    pub fn remove_gear_from(graph: &mut OperatorGraph, op: OperatorKey, index: usize) -> Result<Gear> {
        let count = graph.operator_as::<GearsOperator>(op)?.gears.len();
        if index >= count {
            return Err(RigError::PortIndex {
                kind: PortKind::Output,
                index,
                count,
            });
        }
        graph.remove_output(op, index)?;
        graph.modify_operator::<GearsOperator, _>(op, |g| g.gears.remove(index))
    }
}

impl Operator for GearsOperator {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn output_names(&self) -> Vec<String> {
        (0..self.gears.len()).map(|i| format!("Gear{i}")).collect()
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        for (index, gear) in self.gears.iter().enumerate() {
            let Some(mut pose) = ctx.output_pose(index) else {
                continue;
            };
            pose.orientation = (gear.rotation(self.revolutions) * pose.orientation).normalize();
            ctx.set_clean(index, pose);
        }
    }

    fn sync_schedule(&mut self, scheduler: &mut Scheduler, me: OperatorKey) {
        self.driver.sync(scheduler, me);
    }

    fn on_timer(&mut self, task: TaskKey, elapsed: f64) -> bool {
        if !self.driver.owns(task) {
            return false;
        }
        self.revolutions += self.driver.revolutions_in(elapsed);
        true
    }

    fn detach(&mut self, scheduler: &mut Scheduler) {
        self.driver.cancel(scheduler);
    }
}
