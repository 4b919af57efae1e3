//! Piston / Crank
//!
//! A crank turning about its (crank-local) axis drives any number of pistons.
//! Each piston slides along its own direction in the crank's rotation plane;
//! its connecting rod joins the cam (big end) to the piston head.
//!
//! For a crank angle `θ` and cam radius `c`, rod length `r`:
//!
//! - lateral cam offset `b = sin(θ)·c`
//! - rod angle `asin(b / r)`
//! - head offset along the piston axis `sqrt(r² − b²) + cos(θ)·c`
//!
//! Rod and cap outputs move relative to their host-written base poses by the
//! difference between the current state and the state at revolution zero.

use std::f64::consts::TAU;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::graph::{EvalContext, Operator, OperatorKey, OperatorVariant, Scheduler, TaskKey};
use crate::mechanisms::driver::RpmDriver;
use crate::math::{Axis, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Piston {
    /// Direction of travel about the crank axis, in radians.
    pub piston_angle: f64,
    /// Cam phase, in turns.
    pub cam_phase: f64,
    pub cam_length: f64,
    pub rod_length: f64,
}

impl Piston {
    #[must_use]
    pub fn new(piston_angle: f64, cam_phase: f64, cam_length: f64, rod_length: f64) -> Self {
        Self {
            piston_angle,
            cam_phase,
            cam_length,
            rod_length,
        }
    }
}

/// Piston state at one crank angle, in the crank's base frame.
#[derive(Debug, Clone, Copy)]
struct PistonState {
    big_end: DVec3,
    rod_angle: f64,
    head_offset: f64,
}

/// Frame of one piston in the crank's base frame.
#[derive(Debug, Clone, Copy)]
struct PistonFrame {
    axis: DVec3,
    cam_side: DVec3,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PistonOperator {
    /// Rotation axis in the crank's local frame.
    pub crank_axis: Axis,
    #[serde(default)]
    pub revolutions: f64,
    #[serde(default)]
    pub driver: RpmDriver,
    pistons: Vec<Piston>,
}

impl PistonOperator {
    pub const CRANK: usize = 0;

    #[must_use]
    pub fn new(crank_axis: Axis) -> Self {
        Self {
            crank_axis,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn pistons(&self) -> &[Piston] {
        &self.pistons
    }

    pub fn piston_mut(&mut self, index: usize) -> Option<&mut Piston> {
        self.pistons.get_mut(index)
    }

    /// Adds a piston. Returns its index; see [`rod_output`](Self::rod_output)
    /// and [`cap_output`](Self::cap_output) for its ports.
    pub fn add_piston(&mut self, piston: Piston) -> usize {
        self.pistons.push(piston);
        self.pistons.len() - 1
    }

    #[inline]
    #[must_use]
    pub fn rod_output(piston: usize) -> usize {
        1 + 2 * piston
    }

    #[inline]
    #[must_use]
    pub fn cap_output(piston: usize) -> usize {
        2 + 2 * piston
    }

    fn frame(&self, piston: &Piston) -> PistonFrame {
        let axis = self.crank_axis.to_vec3();
        let reference = axis.any_orthonormal_vector();
        let direction = DQuat::from_axis_angle(axis, piston.piston_angle) * reference;
        PistonFrame {
            axis: direction,
            cam_side: axis.cross(direction),
        }
    }

    /// `None` when the rod cannot reach the cam (`|b| > rod`).
    fn state(frame: &PistonFrame, piston: &Piston, revolutions: f64) -> Option<PistonState> {
        let theta = TAU * (revolutions + piston.cam_phase);
        let (sin, cos) = theta.sin_cos();
        let lateral = sin * piston.cam_length;
        if lateral.abs() > piston.rod_length {
            return None;
        }
        Some(PistonState {
            big_end: (frame.axis * cos + frame.cam_side * sin) * piston.cam_length,
            rod_angle: (lateral / piston.rod_length).asin(),
            head_offset: (piston.rod_length * piston.rod_length - lateral * lateral).sqrt() + cos * piston.cam_length,
        })
    }
}

impl Operator for PistonOperator {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn output_names(&self) -> Vec<String> {
        let mut names = vec!["Crank".to_string()];
        for i in 0..self.pistons.len() {
            names.push(format!("Rod{i}"));
            names.push(format!("Cap{i}"));
        }
        names
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        let crank_base = ctx.output_pose(Self::CRANK).unwrap_or(Pose::IDENTITY);
        let axis = self.crank_axis.to_vec3();

        let mut crank = crank_base;
        crank.orientation = (crank_base.orientation * DQuat::from_axis_angle(axis, TAU * self.revolutions)).normalize();
        ctx.set_clean(Self::CRANK, crank);

        let world_axis = crank_base.orientation * axis;
        for (index, piston) in self.pistons.iter().enumerate() {
            let frame = self.frame(piston);
            let (Some(rest), Some(current)) = (
                Self::state(&frame, piston, 0.0),
                Self::state(&frame, piston, self.revolutions),
            ) else {
                log::warn!(
                    "Piston {index}: rod length {} cannot reach cam length {}; holding previous pose",
                    piston.rod_length,
                    piston.cam_length
                );
                continue;
            };

            if let Some(mut rod) = ctx.output_pose(Self::rod_output(index)) {
                rod.translation += crank_base.orientation * (current.big_end - rest.big_end);
                let swing = DQuat::from_axis_angle(world_axis, -(current.rod_angle - rest.rod_angle));
                rod.orientation = (swing * rod.orientation).normalize();
                ctx.set_clean(Self::rod_output(index), rod);
            }
            if let Some(mut cap) = ctx.output_pose(Self::cap_output(index)) {
                cap.translation += crank_base.orientation * frame.axis * (current.head_offset - rest.head_offset);
                ctx.set_clean(Self::cap_output(index), cap);
            }
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
