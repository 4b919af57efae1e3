//! Explode View
//!
//! Slides parts outward along their axes as the `Explode` value goes from 0 to 1.
//!
//! Parts are grouped into stages. With `cascade` the stages move one after the
//! other; otherwise all parts move together and earlier stages travel further.

use serde::{Deserialize, Serialize};

use crate::graph::{EvalContext, Operator, OperatorVariant};
use crate::math::{linear_step, Axis, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplodePart {
    pub stage: u32,
    pub axis: Axis,
    /// Explode interval `[t0, t1]` over which this part moves.
    pub movement: [f64; 2],
    pub multiplier: f64,
}

impl Default for ExplodePart {
    fn default() -> Self {
        Self {
            stage: 0,
            axis: Axis::X,
            movement: [0.0, 1.0],
            multiplier: 1.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplodePartsOperator {
    /// Used when the `Explode` input is not connected.
    pub explode: f64,
    pub distance: f64,
    pub offset: f64,
    pub stages: u32,
    pub cascade: bool,
    pub centered: bool,
    parts: Vec<ExplodePart>,
    #[serde(skip)]
    relative_bind: Option<Pose>,
}

impl Default for ExplodePartsOperator {
    fn default() -> Self {
        Self {
            explode: 0.0,
            distance: 1.0,
            offset: 0.0,
            stages: 1,
            cascade: false,
            centered: false,
            parts: Vec::new(),
            relative_bind: None,
        }
    }
}

impl ExplodePartsOperator {
    pub const EXPLODE: usize = 0;
    pub const RELATIVE_TO: usize = 1;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn parts(&self) -> &[ExplodePart] {
        &self.parts
    }

    pub fn part_mut(&mut self, index: usize) -> Option<&mut ExplodePart> {
        self.parts.get_mut(index)
    }

    /// Returns the part's output index.
    pub fn add_part(&mut self, part: ExplodePart) -> usize {
        self.parts.push(part);
        self.parts.len() - 1
    }

    /// Forgets the reference frame captured on first use.
    pub fn reset_relative_bind(&mut self) {
        self.relative_bind = None;
    }

    /// Travel of `part` along its axis for an explode value.
    #[must_use]
    pub fn part_distance(&self, part: &ExplodePart, explode: f64) -> f64 {
        let stages = f64::from(self.stages.max(1));
        let stage = f64::from(part.stage) / stages;
        let [t0, t1] = part.movement;

        let travel = if self.cascade {
            let start = if self.centered { stage - 0.5 } else { stage };
            linear_step(t0, t1, (explode - start).max(0.0))
        } else {
            // Centering spreads the stage weights around zero.
            let mut weight = 1.0 - stage;
            if self.centered {
                weight -= 0.5;
            }
            linear_step(t0, t1, explode) * weight
        };
        self.distance * travel * part.multiplier + self.offset
    }
}

impl Operator for ExplodePartsOperator {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn input_names(&self) -> Vec<String> {
        vec!["Explode".to_string(), "RelativeTo".to_string()]
    }

    fn output_names(&self) -> Vec<String> {
        (0..self.parts.len()).map(|i| format!("Part{i}")).collect()
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        let explode = ctx.input_scalar(Self::EXPLODE).unwrap_or(self.explode);

        let frame = ctx.input_pose(Self::RELATIVE_TO);
        if let Some(frame) = frame {
            self.relative_bind.get_or_insert(frame);
        }
        let carry = match (frame, self.relative_bind) {
            (Some(frame), Some(bind)) => Some((frame * bind.inverse(), frame)),
            _ => None,
        };

        for (index, part) in self.parts.iter().enumerate() {
            let Some(base) = ctx.output_pose(index) else {
                continue;
            };
            let distance = self.part_distance(part, explode);

            let (mut pose, direction) = match carry {
                Some((delta, frame)) => (delta * base, frame.orientation * part.axis.to_vec3()),
                None => (base, part.axis.to_vec3()),
            };
            pose.translation += direction * distance;
            ctx.set_clean(index, pose);
        }
    }
}
