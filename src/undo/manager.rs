use smallvec::SmallVec;

use crate::animation::TrackStore;
use crate::errors::{Result, RigError};
use crate::graph::TrackKey;
use crate::undo::change::TrackChange;

/// A named group of changes undone and redone as one step.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    name: String,
    changes: Vec<TrackChange>,
}

impl Transaction {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn changes(&self) -> &[TrackChange] {
        &self.changes
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Reverses every change, newest first. On failure the changes already
    /// reversed are re-applied, leaving the tracks as they were.
    fn undo(&self, tracks: &mut TrackStore) -> Result<()> {
        let len = self.changes.len();
        for (undone, change) in self.changes.iter().rev().enumerate() {
            if let Err(err) = change.undo(tracks) {
                for done in &self.changes[len - undone..] {
                    if let Err(rollback) = done.redo(tracks) {
                        log::warn!("Transaction '{}': rollback failed: {rollback}", self.name);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Re-applies every change, oldest first. On failure the changes already
    /// re-applied are reversed again.
    fn redo(&self, tracks: &mut TrackStore) -> Result<()> {
        for (redone, change) in self.changes.iter().enumerate() {
            if let Err(err) = change.redo(tracks) {
                for done in self.changes[..redone].iter().rev() {
                    if let Err(rollback) = done.undo(tracks) {
                        log::warn!("Transaction '{}': rollback failed: {rollback}", self.name);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn affected_tracks(&self) -> SmallVec<[TrackKey; 4]> {
        let mut tracks: SmallVec<[TrackKey; 4]> = SmallVec::new();
        for change in &self.changes {
            if !tracks.contains(&change.track()) {
                tracks.push(change.track());
            }
        }
        tracks
    }
}

/// History of committed transactions.
///
/// - At most one transaction is open at a time.
/// - Committing a non-empty transaction clears the redo stack.
/// - Undo/redo are refused while a transaction is open.
#[derive(Debug, Default)]
pub struct UndoRedoManager {
    open: Option<Transaction>,
    undo_stack: Vec<Transaction>,
    redo_stack: Vec<Transaction>,
}

impl UndoRedoManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_transaction(&mut self, name: impl Into<String>) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(RigError::TransactionOpen(open.name.clone()));
        }
        let name = name.into();
        log::debug!("Begin transaction '{name}'");
        self.open = Some(Transaction::new(name));
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Adds an applied change to the open transaction. Without an open
    /// transaction the change is committed on its own.
    pub fn record(&mut self, change: TrackChange) {
        match &mut self.open {
            Some(open) => open.changes.push(change),
            None => {
                self.undo_stack.push(Transaction {
                    name: "Edit Key".to_string(),
                    changes: vec![change],
                });
                self.redo_stack.clear();
            }
        }
    }

    /// The latest change of the open transaction at `(track, time)`, if a
    /// write there can be folded into it.
    pub fn coalescable_mut(&mut self, track: TrackKey, time: f64) -> Option<&mut TrackChange> {
        let latest = self
            .open
            .as_mut()?
            .changes
            .iter_mut()
            .rev()
            .find(|change| change.touches(track, time))?;
        if latest.can_coalesce(track, time) {
            Some(latest)
        } else {
            None
        }
    }

    /// Commits the open transaction. Returns `false` if it was empty and
    /// therefore dropped.
    pub fn commit_transaction(&mut self) -> Result<bool> {
        let transaction = self.open.take().ok_or(RigError::NoTransaction)?;
        if transaction.is_empty() {
            log::debug!("Dropped empty transaction '{}'", transaction.name);
            return Ok(false);
        }
        log::debug!(
            "Commit transaction '{}' ({} changes)",
            transaction.name,
            transaction.changes.len()
        );
        self.undo_stack.push(transaction);
        self.redo_stack.clear();
        Ok(true)
    }

    /// Rolls back and discards the open transaction. Returns the tracks it touched.
    pub fn cancel_transaction(&mut self, tracks: &mut TrackStore) -> Result<SmallVec<[TrackKey; 4]>> {
        let transaction = self.open.take().ok_or(RigError::NoTransaction)?;
        if let Err(err) = transaction.undo(tracks) {
            self.open = Some(transaction);
            return Err(err);
        }
        log::debug!("Cancelled transaction '{}'", transaction.name);
        Ok(transaction.affected_tracks())
    }

    /// Undoes the latest transaction. Returns the tracks it touched (empty
    /// when there is nothing to undo).
    pub fn undo(&mut self, tracks: &mut TrackStore) -> Result<SmallVec<[TrackKey; 4]>> {
        self.ensure_closed()?;
        let Some(transaction) = self.undo_stack.pop() else {
            return Ok(SmallVec::new());
        };
        if let Err(err) = transaction.undo(tracks) {
            self.undo_stack.push(transaction);
            return Err(err);
        }
        log::debug!("Undo '{}'", transaction.name);
        let affected = transaction.affected_tracks();
        self.redo_stack.push(transaction);
        Ok(affected)
    }

    pub fn redo(&mut self, tracks: &mut TrackStore) -> Result<SmallVec<[TrackKey; 4]>> {
        self.ensure_closed()?;
        let Some(transaction) = self.redo_stack.pop() else {
            return Ok(SmallVec::new());
        };
        if let Err(err) = transaction.redo(tracks) {
            self.redo_stack.push(transaction);
            return Err(err);
        }
        log::debug!("Redo '{}'", transaction.name);
        let affected = transaction.affected_tracks();
        self.undo_stack.push(transaction);
        Ok(affected)
    }

    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_name(&self) -> Option<&str> {
        self.undo_stack.last().map(Transaction::name)
    }

    #[must_use]
    pub fn redo_name(&self) -> Option<&str> {
        self.redo_stack.last().map(Transaction::name)
    }

    /// Drops all committed history. The open transaction, if any, is kept.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Fails with [`RigError::TransactionOpen`] while a transaction is open.
    pub fn ensure_closed(&self) -> Result<()> {
        match &self.open {
            Some(open) => Err(RigError::TransactionOpen(open.name.clone())),
            None => Ok(()),
        }
    }
}
