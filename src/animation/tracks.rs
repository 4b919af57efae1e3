use serde::{Deserialize, Serialize};

use crate::animation::values::Interpolatable;
use crate::errors::{Result, RigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    #[default]
    Linear,
    /// Holds the left key until the next key time.
    Step,
}

/// Pending notification about a structural or value edit of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEvent {
    KeyAdded { index: usize },
    KeyRemoved { index: usize },
    KeyChanged { index: usize },
}

/// Position of a sample time within a track.
///
/// `lerp` is in `[0, 1)`: zero at an exact key time and outside the keyed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyAndLerp {
    pub key_index: usize,
    pub lerp: f64,
}

const MAX_SCAN_OFFSET: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

/// A time-keyed sequence of values.
///
/// Times are finite and strictly increasing. Every mutation queues a
/// [`TrackEvent`]; the owning graph drains them to dirty dependent operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    try_from = "TrackRepr<T>",
    into = "TrackRepr<T>",
    bound(serialize = "T: Serialize + Copy", deserialize = "T: Deserialize<'de>")
)]
pub struct KeyframeTrack<T> {
    name: String,
    times: Vec<f64>,
    values: Vec<T>,
    interpolation: InterpolationMode,
    events: Vec<TrackEvent>,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    #[must_use]
    pub fn new(name: impl Into<String>, interpolation: InterpolationMode) -> Self {
        Self {
            name: name.into(),
            times: Vec::new(),
            values: Vec::new(),
            interpolation,
            events: Vec::new(),
        }
    }

    /// Builds a track from `(time, value)` pairs, which must be strictly
    /// increasing in time.
    pub fn from_keys(
        name: impl Into<String>,
        interpolation: InterpolationMode,
        keys: impl IntoIterator<Item = (f64, T)>,
    ) -> Result<Self> {
        let (times, values): (Vec<f64>, Vec<T>) = keys.into_iter().unzip();
        validate_times(&times)?;
        Ok(Self {
            name: name.into(),
            times,
            values,
            interpolation,
            events: Vec::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: InterpolationMode) {
        self.interpolation = interpolation;
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[must_use]
    pub fn key_time(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    #[must_use]
    pub fn key_value(&self, index: usize) -> Option<T> {
        self.values.get(index).copied()
    }

    /// Index of the key at exactly `time`.
    #[must_use]
    pub fn key_index_at(&self, time: f64) -> Option<usize> {
        self.times.binary_search_by(|t| t.total_cmp(&time)).ok()
    }

    /// Inserts a key, keeping times sorted. Returns the new key's index.
    pub fn add_key(&mut self, time: f64, value: T) -> Result<usize> {
        if !time.is_finite() {
            return Err(RigError::InvalidKeyTime(time));
        }
        let index = self.times.partition_point(|&t| t < time);
        if self.times.get(index) == Some(&time) {
            return Err(RigError::DuplicateKeyTime(time));
        }
        self.times.insert(index, time);
        self.values.insert(index, value);
        self.events.push(TrackEvent::KeyAdded { index });
        Ok(index)
    }

    /// Removes a key, returning its time and value.
    pub fn remove_key(&mut self, index: usize) -> Result<(f64, T)> {
        self.check_index(index)?;
        let time = self.times.remove(index);
        let value = self.values.remove(index);
        self.events.push(TrackEvent::KeyRemoved { index });
        Ok((time, value))
    }

    /// Replaces a key's value, returning the previous one.
    pub fn set_key_value(&mut self, index: usize, value: T) -> Result<T> {
        self.check_index(index)?;
        let previous = std::mem::replace(&mut self.values[index], value);
        self.events.push(TrackEvent::KeyChanged { index });
        Ok(previous)
    }

    /// Writes `value` at `time` without history: modifies the key at that
    /// exact time, inserts one otherwise.
    pub fn set_value(&mut self, time: f64, value: T) -> Result<usize> {
        match self.key_index_at(time) {
            Some(index) => {
                self.set_key_value(index, value)?;
                Ok(index)
            }
            None => self.add_key(time, value),
        }
    }

    #[must_use]
    pub fn find_key_and_lerp(&self, time: f64) -> Option<KeyAndLerp> {
        if self.times.is_empty() {
            return None;
        }
        // First index whose time is > `time`.
        let next = self.times.partition_point(|&t| t <= time);
        Some(self.key_and_lerp_at(next.saturating_sub(1), time))
    }

    /// Like [`find_key_and_lerp`](Self::find_key_and_lerp), scanning a few keys
    /// around the cursor before falling back to a binary search.
    pub fn find_key_and_lerp_with_cursor(&self, time: f64, cursor: &mut KeyframeCursor) -> Option<KeyAndLerp> {
        let len = self.times.len();
        if len == 0 {
            return None;
        }
        if len == 1 {
            cursor.last_index = 0;
            return Some(KeyAndLerp { key_index: 0, lerp: 0.0 });
        }

        let i = cursor.last_index.min(len - 1);
        let t_curr = self.times[i];

        let found = if time >= t_curr {
            // Forward (playback)
            let mut res = None;
            for idx in i..=(i + MAX_SCAN_OFFSET) {
                if idx >= len - 1 {
                    res = Some(len - 1);
                    break;
                }
                if time < self.times[idx + 1] {
                    res = Some(idx);
                    break;
                }
            }
            res
        } else {
            // Backward (reverse scrub)
            (1..=MAX_SCAN_OFFSET)
                .take_while(|&offset| offset <= i)
                .map(|offset| i - offset)
                .find(|&idx| time >= self.times[idx])
        };

        let index = found.unwrap_or_else(|| self.times.partition_point(|&t| t <= time).saturating_sub(1));
        cursor.last_index = index;
        Some(self.key_and_lerp_at(index, time))
    }

    /// Samples the track. `None` when it has no keys.
    #[must_use]
    pub fn evaluate(&self, time: f64) -> Option<T> {
        self.find_key_and_lerp(time).map(|found| self.blend(found))
    }

    pub fn evaluate_with_cursor(&self, time: f64, cursor: &mut KeyframeCursor) -> Option<T> {
        self.find_key_and_lerp_with_cursor(time, cursor)
            .map(|found| self.blend(found))
    }

    /// Takes the events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<TrackEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    fn key_and_lerp_at(&self, index: usize, time: f64) -> KeyAndLerp {
        let Some(&t1) = self.times.get(index + 1) else {
            return KeyAndLerp { key_index: index, lerp: 0.0 };
        };
        let t0 = self.times[index];
        let lerp = if time <= t0 {
            0.0
        } else {
            ((time - t0) / (t1 - t0)).clamp(0.0, 1.0)
        };
        // `time` is strictly below `t1` here; guard against rounding to 1.
        if lerp >= 1.0 {
            return KeyAndLerp { key_index: index + 1, lerp: 0.0 };
        }
        KeyAndLerp { key_index: index, lerp }
    }

    fn blend(&self, found: KeyAndLerp) -> T {
        let KeyAndLerp { key_index, lerp } = found;
        let start = &self.values[key_index];
        match (self.interpolation, self.values.get(key_index + 1)) {
            (InterpolationMode::Linear, Some(end)) if lerp > 0.0 => T::interpolate_linear(start, end, lerp),
            _ => *start,
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.times.len() {
            Ok(())
        } else {
            Err(RigError::KeyIndex {
                index,
                len: self.times.len(),
            })
        }
    }
}

impl<T> KeyframeTrack<T>
where
    T: Interpolatable + Serialize + for<'de> Deserialize<'de>,
{
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes a track, rejecting unsorted or duplicate key times.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let repr = TrackRepr::<T>::deserialize(value).map_err(|e| RigError::Decode(e.to_string()))?;
        Self::try_from(repr)
    }
}

fn validate_times(times: &[f64]) -> Result<()> {
    for (index, &time) in times.iter().enumerate() {
        if !time.is_finite() {
            return Err(RigError::InvalidKeyTime(time));
        }
        if index > 0 && time <= times[index - 1] {
            return Err(RigError::KeyOrder {
                index,
                time,
                previous: times[index - 1],
            });
        }
    }
    Ok(())
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Serialize, Deserialize)]
struct KeyRepr<T> {
    time: f64,
    value: T,
}

#[derive(Serialize, Deserialize)]
struct TrackRepr<T> {
    name: String,
    #[serde(default)]
    interpolation: InterpolationMode,
    keys: Vec<KeyRepr<T>>,
}

impl<T> From<KeyframeTrack<T>> for TrackRepr<T> {
    fn from(track: KeyframeTrack<T>) -> Self {
        let keys = track
            .times
            .into_iter()
            .zip(track.values)
            .map(|(time, value)| KeyRepr { time, value })
            .collect();
        Self {
            name: track.name,
            interpolation: track.interpolation,
            keys,
        }
    }
}

impl<T> TryFrom<TrackRepr<T>> for KeyframeTrack<T> {
    type Error = RigError;

    fn try_from(repr: TrackRepr<T>) -> Result<Self> {
        let (times, values): (Vec<f64>, Vec<T>) = repr.keys.into_iter().map(|key| (key.time, key.value)).unzip();
        validate_times(&times)?;
        Ok(Self {
            name: repr.name,
            times,
            values,
            interpolation: repr.interpolation,
            events: Vec::new(),
        })
    }
}
