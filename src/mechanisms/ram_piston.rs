use serde::{Deserialize, Serialize};

use crate::graph::{EvalContext, Operator, OperatorVariant};
use crate::math::{shortest_arc, Axis, EPSILON};

/// Points a ram and its piston at each other along a shared local axis.
///
/// Both outputs must be connected; the operator passes through otherwise.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RamAndPistonOperator {
    pub axis: Axis,
}

impl RamAndPistonOperator {
    pub const RAM: usize = 0;
    pub const PISTON: usize = 1;

    #[must_use]
    pub fn new(axis: Axis) -> Self {
        Self { axis }
    }
}

impl Operator for RamAndPistonOperator {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn output_names(&self) -> Vec<String> {
        vec!["Ram".to_string(), "Piston".to_string()]
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        let (Some(mut ram), Some(mut piston)) = (ctx.output_pose(Self::RAM), ctx.output_pose(Self::PISTON)) else {
            ctx.pass_through();
            return;
        };

        let separation = piston.translation - ram.translation;
        if separation.length_squared() < EPSILON {
            log::warn!("Ram and piston {:?} coincide; holding previous pose", ctx.operator());
            return;
        }

        let axis = self.axis.to_vec3();
        if let Some(rotation) = shortest_arc(ram.orientation * axis, separation) {
            ram.orientation = (rotation * ram.orientation).normalize();
        }
        if let Some(rotation) = shortest_arc(piston.orientation * axis, -separation) {
            piston.orientation = (rotation * piston.orientation).normalize();
        }

        ctx.set_clean(Self::RAM, ram);
        ctx.set_clean(Self::PISTON, piston);
    }
}
