//! Math Module
//!
//! Value types shared by every operator:
//!
//! - [`Pose`]: translation + orientation + scale, composable and invertible
//! - [`Color`]: RGBA value carried by color tracks
//! - [`Axis`]: principal axis selector used by joints and alignment operators
//!
//! plus a handful of geometric helpers. Helpers that can degenerate (zero-length
//! inputs) return `Option` so callers can hold their previous pose instead of
//! propagating NaN.

pub mod color;
pub mod pose;

pub use color::Color;
pub use pose::Pose;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Lengths below this are treated as zero by the geometric helpers.
pub const EPSILON: f64 = 1e-12;

/// A principal axis of a local frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    #[inline]
    #[must_use]
    pub fn to_vec3(self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
        }
    }
}

/// Shortest-arc rotation taking the direction of `from` onto the direction of `to`.
///
/// Returns `None` when either vector has (near) zero length.
#[must_use]
pub fn shortest_arc(from: DVec3, to: DVec3) -> Option<DQuat> {
    let from = from.try_normalize()?;
    let to = to.try_normalize()?;
    let rotation = DQuat::from_rotation_arc(from, to);
    rotation.is_finite().then_some(rotation)
}

/// Signed rotation angle of `rotation` about `axis` (the twist component).
///
/// `axis` must be unit length. The result lies in `(-PI, PI]`.
#[must_use]
pub fn twist_angle(rotation: DQuat, axis: DVec3) -> f64 {
    let reference = axis.any_orthonormal_vector();
    let rotated = rotation * reference;
    let projected = rotated - axis * rotated.dot(axis);
    if projected.length_squared() < EPSILON {
        return 0.0;
    }
    axis.dot(reference.cross(projected)).atan2(reference.dot(projected))
}

/// Normalized position of `x` between `edge0` and `edge1`, clamped to `[0, 1]`.
///
/// A zero-width range acts as a step at `edge0`.
#[must_use]
pub fn linear_step(edge0: f64, edge1: f64, x: f64) -> f64 {
    let width = edge1 - edge0;
    if width.abs() < EPSILON {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    ((x - edge0) / width).clamp(0.0, 1.0)
}
