//! Keyframe tracks and their graph-side sampler.

mod values;
pub mod sampler;
pub mod track_data;
pub mod tracks;

pub use sampler::TrackSampler;
pub use track_data::{TrackData, TrackStore, TrackValue};
pub use tracks::{InterpolationMode, KeyAndLerp, KeyframeCursor, KeyframeTrack, TrackEvent};
pub use values::Interpolatable;
