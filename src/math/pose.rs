use std::ops::Mul;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// A similarity transform: translation, unit-quaternion orientation and scale.
///
/// Poses are plain values. Operators read a pose from a port, edit a local copy
/// and write it back.
///
/// # Composition
///
/// `parent * child` maps the child's local frame into the parent's frame:
/// the child translation is scaled, rotated and offset by the parent, and the
/// orientations are chained. The resulting orientation is re-normalized so
/// long operator chains do not drift away from unit length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub translation: DVec3,
    pub orientation: DQuat,
    pub scale: DVec3,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        orientation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    #[must_use]
    pub fn new(translation: DVec3, orientation: DQuat, scale: DVec3) -> Self {
        Self {
            translation,
            orientation,
            scale,
        }
    }

    #[must_use]
    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_rotation(orientation: DQuat) -> Self {
        Self {
            orientation,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_translation_rotation(translation: DVec3, orientation: DQuat) -> Self {
        Self {
            translation,
            orientation,
            scale: DVec3::ONE,
        }
    }

    /// Inverse transform.
    ///
    /// Exact for uniform scale. With non-uniform scale and rotation the result is
    /// the usual TRS approximation (shear cannot be represented).
    #[must_use]
    pub fn inverse(&self) -> Self {
        let scale = self.scale.recip();
        let orientation = self.orientation.inverse();
        let translation = (orientation * -self.translation) * scale;
        Self {
            translation,
            orientation,
            scale,
        }
    }

    /// Maps a point from this pose's local frame into its parent frame.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.translation + self.orientation * (self.scale * point)
    }

    /// Maps a direction (no translation) from the local frame into the parent frame.
    #[inline]
    #[must_use]
    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        self.orientation * (self.scale * vector)
    }

    /// Linear translation/scale and shortest-arc spherical orientation blend.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        // Flip to the same hemisphere so the blend takes the short way round.
        let end = if self.orientation.dot(other.orientation) < 0.0 {
            -other.orientation
        } else {
            other.orientation
        };
        Self {
            translation: self.translation.lerp(other.translation, t),
            orientation: self.orientation.slerp(end, t).normalize(),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    /// Returns a copy with a unit-length orientation.
    #[inline]
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.orientation = self.orientation.normalize();
        self
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.orientation.is_finite() && self.scale.is_finite()
    }

    /// Component-wise comparison. Orientations `q` and `-q` compare equal.
    #[must_use]
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f64) -> bool {
        let orientation_eq = self.orientation.abs_diff_eq(other.orientation, max_abs_diff)
            || self.orientation.abs_diff_eq(-other.orientation, max_abs_diff);
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && orientation_eq
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose {
            translation: self.transform_point(rhs.translation),
            orientation: (self.orientation * rhs.orientation).normalize(),
            scale: self.scale * rhs.scale,
        }
    }
}

impl Mul<&Pose> for &Pose {
    type Output = Pose;

    fn mul(self, rhs: &Pose) -> Pose {
        *self * *rhs
    }
}
