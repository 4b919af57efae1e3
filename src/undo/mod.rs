//! Undo/redo of keyframe edits.
//!
//! Every key edit made through the graph is captured as a [`TrackChange`] and
//! grouped into a named [`Transaction`] (one per user gesture).

pub mod change;
pub mod manager;

pub use change::{KeyEdit, TrackChange};
pub use manager::{Transaction, UndoRedoManager};
