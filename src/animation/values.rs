use crate::math::{Color, Pose};

/// A keyframe value that can be blended between two keys.
pub trait Interpolatable: Copy + Sized {
    fn interpolate_linear(start: &Self, end: &Self, t: f64) -> Self;
}

impl Interpolatable for f64 {
    fn interpolate_linear(start: &Self, end: &Self, t: f64) -> Self {
        start + (end - start) * t
    }
}

impl Interpolatable for Pose {
    /// Translation and scale blend linearly, orientation takes the shortest arc.
    fn interpolate_linear(start: &Self, end: &Self, t: f64) -> Self {
        start.lerp(end, t)
    }
}

impl Interpolatable for Color {
    fn interpolate_linear(start: &Self, end: &Self, t: f64) -> Self {
        start.lerp(end, t)
    }
}
