//! Track editing through the undo history.
//!
//! All key edits made here are recorded as [`TrackChange`]s. After every edit
//! (and every undo/redo) the affected tracks' events are flushed, which marks
//! each operator watching the track dirty.

use smallvec::SmallVec;

use crate::animation::{TrackData, TrackValue};
use crate::errors::{Result, RigError};
use crate::graph::graph::OperatorGraph;
use crate::graph::{OperatorKey, TrackKey};
use crate::undo::{TrackChange, UndoRedoManager};

impl OperatorGraph {
    pub fn add_track(&mut self, track: TrackData) -> TrackKey {
        self.tracks.insert(track)
    }

    #[inline]
    #[must_use]
    pub fn track(&self, key: TrackKey) -> Option<&TrackData> {
        self.tracks.get(key)
    }

    pub fn track_keys(&self) -> impl Iterator<Item = TrackKey> + '_ {
        self.tracks.keys()
    }

    /// Removes a track. Operators watching it stop watching, and the undo
    /// history is cleared since it may refer to the track. Refused while a
    /// transaction is open.
    pub fn remove_track(&mut self, key: TrackKey) -> Result<TrackData> {
        self.history.ensure_closed()?;
        let watchers = self.watchers_of(key);
        let track = self.tracks.remove(key).ok_or(RigError::TrackNotFound(key))?;
        for op in watchers {
            if let Some(node) = self.operators.get_mut(op).and_then(|slot| slot.node.as_mut()) {
                node.as_operator_mut().set_watched_track(None);
            }
            self.set_operator_dirty(op);
        }
        self.history.clear();
        log::debug!("Removed track '{}'", track.name());
        Ok(track)
    }

    pub fn add_track_key(&mut self, track: TrackKey, time: f64, value: impl Into<TrackValue>) -> Result<usize> {
        let (change, index) = TrackChange::add_key(&mut self.tracks, track, time, value.into())?;
        self.history.record(change);
        self.flush_track_events(track);
        Ok(index)
    }

    pub fn remove_track_key(&mut self, track: TrackKey, index: usize) -> Result<()> {
        let change = TrackChange::remove_key(&mut self.tracks, track, index)?;
        self.history.record(change);
        self.flush_track_events(track);
        Ok(())
    }

    pub fn set_track_key_value(&mut self, track: TrackKey, index: usize, value: impl Into<TrackValue>) -> Result<()> {
        let change = TrackChange::modify_key(&mut self.tracks, track, index, value.into())?;
        self.history.record(change);
        self.flush_track_events(track);
        Ok(())
    }

    /// Writes `value` into a track at `time`: modifies the key at that exact
    /// time, inserts a new key otherwise. Returns the key's index.
    ///
    /// Repeated writes at the same track and time inside one open transaction
    /// are folded into a single change, so a drag gesture undoes in one step.
    pub fn set_track_value(&mut self, track: TrackKey, time: f64, value: impl Into<TrackValue>) -> Result<usize> {
        let value = value.into();

        if let Some(change) = self.history.coalescable_mut(track, time) {
            change.retarget(&mut self.tracks, value)?;
        } else {
            let data = self.tracks.get(track).ok_or(RigError::TrackNotFound(track))?;
            let change = match data.key_index_at(time) {
                Some(index) => TrackChange::modify_key(&mut self.tracks, track, index, value)?,
                None => TrackChange::add_key(&mut self.tracks, track, time, value)?.0,
            };
            self.history.record(change);
        }

        self.flush_track_events(track);
        self.tracks
            .get(track)
            .and_then(|data| data.key_index_at(time))
            .ok_or(RigError::MissingKeyTime(time))
    }

    // ========================================================================
    // History
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn history(&self) -> &UndoRedoManager {
        &self.history
    }

    pub fn begin_transaction(&mut self, name: impl Into<String>) -> Result<()> {
        self.history.begin_transaction(name)
    }

    /// Returns `false` if the transaction was empty and dropped.
    pub fn commit_transaction(&mut self) -> Result<bool> {
        self.history.commit_transaction()
    }

    pub fn cancel_transaction(&mut self) -> Result<()> {
        let affected = self.history.cancel_transaction(&mut self.tracks)?;
        affected.into_iter().for_each(|track| self.flush_track_events(track));
        Ok(())
    }

    /// Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let affected = self.history.undo(&mut self.tracks)?;
        let changed = !affected.is_empty();
        affected.into_iter().for_each(|track| self.flush_track_events(track));
        Ok(changed)
    }

    pub fn redo(&mut self) -> Result<bool> {
        let affected = self.history.redo(&mut self.tracks)?;
        let changed = !affected.is_empty();
        affected.into_iter().for_each(|track| self.flush_track_events(track));
        Ok(changed)
    }

    /// Drains a track's pending events and dirties the operators watching it.
    pub fn flush_track_events(&mut self, track: TrackKey) {
        let Some(data) = self.tracks.get_mut(track) else {
            return;
        };
        let events = data.drain_events();
        if events.is_empty() {
            return;
        }
        log::trace!("Track '{}': {events:?}", data.name());

        for op in self.watchers_of(track) {
            self.set_operator_dirty(op);
        }
    }

    fn watchers_of(&self, track: TrackKey) -> SmallVec<[OperatorKey; 4]> {
        self.operators
            .iter()
            .filter(|(_, slot)| {
                slot.node
                    .as_ref()
                    .is_some_and(|node| node.as_operator().watched_track() == Some(track))
            })
            .map(|(key, _)| key)
            .collect()
    }
}
