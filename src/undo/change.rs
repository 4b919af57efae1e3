use crate::animation::{TrackData, TrackStore, TrackValue};
use crate::errors::{Result, RigError};
use crate::graph::TrackKey;

/// One key edit. Keys are located by time, which stays valid across the
/// index shifts caused by other edits.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyEdit {
    Add { time: f64, value: TrackValue },
    Modify { time: f64, previous: TrackValue, value: TrackValue },
    Remove { time: f64, value: TrackValue },
}

/// An applied key edit that can be exactly reversed and re-applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackChange {
    track: TrackKey,
    edit: KeyEdit,
}

impl TrackChange {
    /// Adds a key and returns the change together with the new key's index.
    pub fn add_key(tracks: &mut TrackStore, track: TrackKey, time: f64, value: TrackValue) -> Result<(Self, usize)> {
        let index = track_mut(tracks, track)?.add_key(time, value)?;
        let change = Self {
            track,
            edit: KeyEdit::Add { time, value },
        };
        Ok((change, index))
    }

    pub fn modify_key(tracks: &mut TrackStore, track: TrackKey, index: usize, value: TrackValue) -> Result<Self> {
        let data = track_mut(tracks, track)?;
        let time = data.key_time(index).ok_or(RigError::KeyIndex {
            index,
            len: data.len(),
        })?;
        let previous = data.set_key_value(index, value)?;
        Ok(Self {
            track,
            edit: KeyEdit::Modify { time, previous, value },
        })
    }

    pub fn remove_key(tracks: &mut TrackStore, track: TrackKey, index: usize) -> Result<Self> {
        let (time, value) = track_mut(tracks, track)?.remove_key(index)?;
        Ok(Self {
            track,
            edit: KeyEdit::Remove { time, value },
        })
    }

    #[inline]
    #[must_use]
    pub fn track(&self) -> TrackKey {
        self.track
    }

    #[inline]
    #[must_use]
    pub fn edit(&self) -> &KeyEdit {
        &self.edit
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        match self.edit {
            KeyEdit::Add { time, .. } | KeyEdit::Modify { time, .. } | KeyEdit::Remove { time, .. } => time,
        }
    }

    pub fn undo(&self, tracks: &mut TrackStore) -> Result<()> {
        let data = track_mut(tracks, self.track)?;
        match self.edit {
            KeyEdit::Add { time, .. } => {
                let index = data.key_index_at(time).ok_or(RigError::MissingKeyTime(time))?;
                data.remove_key(index)?;
            }
            KeyEdit::Modify { time, previous, .. } => {
                let index = data.key_index_at(time).ok_or(RigError::MissingKeyTime(time))?;
                data.set_key_value(index, previous)?;
            }
            KeyEdit::Remove { time, value } => {
                data.add_key(time, value)?;
            }
        }
        Ok(())
    }

    pub fn redo(&self, tracks: &mut TrackStore) -> Result<()> {
        let data = track_mut(tracks, self.track)?;
        match self.edit {
            KeyEdit::Add { time, value } => {
                data.add_key(time, value)?;
            }
            KeyEdit::Modify { time, value, .. } => {
                let index = data.key_index_at(time).ok_or(RigError::MissingKeyTime(time))?;
                data.set_key_value(index, value)?;
            }
            KeyEdit::Remove { time, .. } => {
                let index = data.key_index_at(time).ok_or(RigError::MissingKeyTime(time))?;
                data.remove_key(index)?;
            }
        }
        Ok(())
    }

    /// Whether this change edited the key at `time` on `track`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn touches(&self, track: TrackKey, time: f64) -> bool {
        self.track == track && self.time() == time
    }

    /// Whether a later write at the same track and time can be folded into
    /// this change. A removal leaves no key to write over.
    #[must_use]
    pub fn can_coalesce(&self, track: TrackKey, time: f64) -> bool {
        self.touches(track, time) && matches!(self.edit, KeyEdit::Add { .. } | KeyEdit::Modify { .. })
    }

    /// Writes `value` over the key this change produced and folds it into the
    /// record. The original previous value is kept, so one undo restores the
    /// state before the first write.
    pub fn retarget(&mut self, tracks: &mut TrackStore, value: TrackValue) -> Result<()> {
        let data = track_mut(tracks, self.track)?;
        match &mut self.edit {
            KeyEdit::Add { time, value: current } | KeyEdit::Modify { time, value: current, .. } => {
                let index = data.key_index_at(*time).ok_or(RigError::MissingKeyTime(*time))?;
                data.set_key_value(index, value)?;
                *current = value;
                Ok(())
            }
            KeyEdit::Remove { time, .. } => Err(RigError::MissingKeyTime(*time)),
        }
    }
}

fn track_mut(tracks: &mut TrackStore, track: TrackKey) -> Result<&mut TrackData> {
    tracks.get_mut(track).ok_or(RigError::TrackNotFound(track))
}
