use serde::{Deserialize, Serialize};

use crate::animation::TrackValue;
use crate::errors::{Result, RigError};
use crate::math::{Color, Pose};

/// A value carried by a parameter and read/written through ports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    Pose(Pose),
    Scalar(f64),
    Color(Color),
}

impl PortValue {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PortValue::Pose(_) => "Pose",
            PortValue::Scalar(_) => "Scalar",
            PortValue::Color(_) => "Color",
        }
    }

    #[must_use]
    pub fn as_pose(&self) -> Option<Pose> {
        match self {
            PortValue::Pose(pose) => Some(*pose),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            PortValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_color(&self) -> Option<Color> {
        match self {
            PortValue::Color(color) => Some(*color),
            _ => None,
        }
    }

    /// Converts to a keyframe value; scalars have no track representation.
    pub fn to_track_value(&self) -> Result<TrackValue> {
        match self {
            PortValue::Pose(pose) => Ok(TrackValue::Pose(*pose)),
            PortValue::Color(color) => Ok(TrackValue::Color(*color)),
            PortValue::Scalar(_) => Err(RigError::ValueType {
                expected: "Pose or Color",
                found: self.kind(),
            }),
        }
    }
}

impl From<Pose> for PortValue {
    fn from(pose: Pose) -> Self {
        PortValue::Pose(pose)
    }
}

impl From<f64> for PortValue {
    fn from(value: f64) -> Self {
        PortValue::Scalar(value)
    }
}

impl From<Color> for PortValue {
    fn from(color: Color) -> Self {
        PortValue::Color(color)
    }
}

impl From<TrackValue> for PortValue {
    fn from(value: TrackValue) -> Self {
        match value {
            TrackValue::Pose(pose) => PortValue::Pose(pose),
            TrackValue::Color(color) => PortValue::Color(color),
        }
    }
}
