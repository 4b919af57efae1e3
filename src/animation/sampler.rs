use serde::{Deserialize, Serialize};

use crate::animation::tracks::KeyframeCursor;
use crate::errors::{Result, RigError};
use crate::graph::{EvalContext, Operator, OperatorGraph, OperatorKey, OperatorVariant, PortValue, TrackKey};

/// Samples a keyframe track at the `Time` input and writes the value to
/// `Output`.
///
/// The sampler watches its track, so any key edit marks its output dirty.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TrackSampler {
    #[serde(skip)]
    track: Option<TrackKey>,
    #[serde(skip)]
    cursor: KeyframeCursor,
}

impl TrackSampler {
    pub const TIME: usize = 0;
    pub const OUTPUT: usize = 0;

    #[must_use]
    pub fn new(track: TrackKey) -> Self {
        Self {
            track: Some(track),
            cursor: KeyframeCursor::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn track(&self) -> Option<TrackKey> {
        self.track
    }

    /// Writes an edited output value back into the sampler's track at the
    /// current `Time` input, through the undo history.
    ///
    /// Returns the index of the written key.
    pub fn write_back(graph: &mut OperatorGraph, sampler: OperatorKey, value: impl Into<PortValue>) -> Result<usize> {
        let track = graph
            .operator_as::<TrackSampler>(sampler)?
            .track
            .ok_or(RigError::SamplerUnbound(sampler))?;
        let time = graph.input_value(sampler, Self::TIME).and_then(|v| v.as_scalar()).unwrap_or(0.0);
        graph.set_track_value(track, time, value.into().to_track_value()?)
    }
}

impl Operator for TrackSampler {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn input_names(&self) -> Vec<String> {
        vec!["Time".to_string()]
    }

    fn output_names(&self) -> Vec<String> {
        vec!["Output".to_string()]
    }

    fn watched_track(&self) -> Option<TrackKey> {
        self.track
    }

    fn set_watched_track(&mut self, track: Option<TrackKey>) {
        self.track = track;
        self.cursor = KeyframeCursor::default();
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) {
        let time = ctx.input_scalar(Self::TIME).unwrap_or(0.0);
        let Some(track) = self.track else {
            ctx.pass_through();
            return;
        };
        let Some(value) = ctx
            .track(track)
            .and_then(|data| data.evaluate_with_cursor(time, &mut self.cursor))
        else {
            ctx.pass_through();
            return;
        };
        ctx.set_clean(Self::OUTPUT, PortValue::from(value));
    }
}
