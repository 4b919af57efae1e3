use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::animation::tracks::{KeyframeCursor, KeyframeTrack, TrackEvent};
use crate::errors::{Result, RigError};
use crate::graph::TrackKey;
use crate::math::{Color, Pose};

/// A value stored in a keyframe track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrackValue {
    Pose(Pose),
    Color(Color),
}

impl TrackValue {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TrackValue::Pose(_) => "Pose",
            TrackValue::Color(_) => "Color",
        }
    }
}

impl From<Pose> for TrackValue {
    fn from(pose: Pose) -> Self {
        TrackValue::Pose(pose)
    }
}

impl From<Color> for TrackValue {
    fn from(color: Color) -> Self {
        TrackValue::Color(color)
    }
}

/// A keyframe track of any supported value type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackData {
    Pose(KeyframeTrack<Pose>),
    Color(KeyframeTrack<Color>),
}

/// Tracks owned by a graph.
pub type TrackStore = SlotMap<TrackKey, TrackData>;

/// Dispatches a method call to the inner `KeyframeTrack`.
macro_rules! with_track {
    ($data:expr, $track:ident => $body:expr) => {
        match $data {
            TrackData::Pose($track) => $body,
            TrackData::Color($track) => $body,
        }
    };
}

impl TrackData {
    #[must_use]
    pub fn name(&self) -> &str {
        with_track!(self, track => track.name())
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TrackData::Pose(_) => "Pose",
            TrackData::Color(_) => "Color",
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        with_track!(self, track => track.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn key_time(&self, index: usize) -> Option<f64> {
        with_track!(self, track => track.key_time(index))
    }

    #[must_use]
    pub fn key_index_at(&self, time: f64) -> Option<usize> {
        with_track!(self, track => track.key_index_at(time))
    }

    #[must_use]
    pub fn key_value(&self, index: usize) -> Option<TrackValue> {
        match self {
            TrackData::Pose(track) => track.key_value(index).map(TrackValue::Pose),
            TrackData::Color(track) => track.key_value(index).map(TrackValue::Color),
        }
    }

    #[must_use]
    pub fn evaluate(&self, time: f64) -> Option<TrackValue> {
        match self {
            TrackData::Pose(track) => track.evaluate(time).map(TrackValue::Pose),
            TrackData::Color(track) => track.evaluate(time).map(TrackValue::Color),
        }
    }

    pub fn evaluate_with_cursor(&self, time: f64, cursor: &mut KeyframeCursor) -> Option<TrackValue> {
        match self {
            TrackData::Pose(track) => track.evaluate_with_cursor(time, cursor).map(TrackValue::Pose),
            TrackData::Color(track) => track.evaluate_with_cursor(time, cursor).map(TrackValue::Color),
        }
    }

    pub fn add_key(&mut self, time: f64, value: TrackValue) -> Result<usize> {
        match (self, value) {
            (TrackData::Pose(track), TrackValue::Pose(pose)) => track.add_key(time, pose),
            (TrackData::Color(track), TrackValue::Color(color)) => track.add_key(time, color),
            (data, value) => Err(mismatch(data, value)),
        }
    }

    pub fn remove_key(&mut self, index: usize) -> Result<(f64, TrackValue)> {
        match self {
            TrackData::Pose(track) => track
                .remove_key(index)
                .map(|(time, pose)| (time, TrackValue::Pose(pose))),
            TrackData::Color(track) => track
                .remove_key(index)
                .map(|(time, color)| (time, TrackValue::Color(color))),
        }
    }

    /// Replaces a key's value, returning the previous one.
    pub fn set_key_value(&mut self, index: usize, value: TrackValue) -> Result<TrackValue> {
        match (self, value) {
            (TrackData::Pose(track), TrackValue::Pose(pose)) => track.set_key_value(index, pose).map(TrackValue::Pose),
            (TrackData::Color(track), TrackValue::Color(color)) => {
                track.set_key_value(index, color).map(TrackValue::Color)
            }
            (data, value) => Err(mismatch(data, value)),
        }
    }

    pub fn drain_events(&mut self) -> Vec<TrackEvent> {
        with_track!(self, track => track.drain_events())
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| RigError::Decode(e.to_string()))
    }
}

fn mismatch(data: &TrackData, value: TrackValue) -> RigError {
    RigError::ValueType {
        expected: data.kind(),
        found: value.kind(),
    }
}
