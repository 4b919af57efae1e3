//! Error Types
//!
//! This module defines the error types used throughout the rig crate.
//!
//! # Overview
//!
//! The main error type [`RigError`] covers API misuse and malformed data:
//! - Graph wiring errors (unknown keys, port indices, single-writer violations)
//! - Keyframe track edits (duplicate times, out-of-range indices, value types)
//! - Undo/redo transaction misuse
//! - Persistence decoding errors
//!
//! Geometry that degenerates during evaluation is *not* an error: operators
//! hold their previous pose and log a warning instead.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, RigError>`.
//!
//! ```rust,ignore
//! use myth_rig::errors::{RigError, Result};
//!
//! fn wire() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::graph::{OperatorKey, ParamKey, TrackKey};

/// Direction of an operator port, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::Input => f.write_str("input"),
            PortKind::Output => f.write_str("output"),
        }
    }
}

/// The main error type for the rig crate.
#[derive(Error, Debug)]
pub enum RigError {
    // ========================================================================
    // Graph Errors
    // ========================================================================
    /// The parameter key does not refer to a live parameter.
    #[error("Parameter not found: {0:?}")]
    ParameterNotFound(ParamKey),

    /// The operator key does not refer to a live operator.
    #[error("Operator not found: {0:?}")]
    OperatorNotFound(OperatorKey),

    /// The operator exists but is not of the requested type.
    #[error("Operator type mismatch: expected {expected}, found {found}")]
    OperatorType {
        /// Requested operator type
        expected: &'static str,
        /// Actual operator type
        found: &'static str,
    },

    /// The operator is currently evaluating and cannot be borrowed.
    #[error("Operator is busy evaluating: {0:?}")]
    OperatorBusy(OperatorKey),

    /// Port index out of bounds.
    #[error("{kind} port index out of bounds: {index} (count: {count})")]
    PortIndex {
        /// Port direction
        kind: PortKind,
        /// The invalid index
        index: usize,
        /// Number of ports of that direction
        count: usize,
    },

    /// A parameter can only be written by one operator output at a time.
    #[error("Parameter '{0}' already has a writer")]
    WriterConflict(String),

    /// A value of the wrong kind was supplied.
    #[error("Value type mismatch: expected {expected}, found {found}")]
    ValueType {
        /// Expected value kind
        expected: &'static str,
        /// Supplied value kind
        found: &'static str,
    },

    // ========================================================================
    // Track Errors
    // ========================================================================
    /// The track key does not refer to a live track.
    #[error("Track not found: {0:?}")]
    TrackNotFound(TrackKey),

    /// The sampler has no track to write into.
    #[error("Track sampler {0:?} is not bound to a track")]
    SamplerUnbound(OperatorKey),

    /// Key index out of bounds.
    #[error("Key index out of bounds: {index} (len: {len})")]
    KeyIndex {
        /// The invalid index
        index: usize,
        /// Number of keys in the track
        len: usize,
    },

    /// A key already exists at this time.
    #[error("Duplicate key time: {0}")]
    DuplicateKeyTime(f64),

    /// No key exists at this time.
    #[error("No key at time: {0}")]
    MissingKeyTime(f64),

    /// Key times must be finite.
    #[error("Invalid key time: {0}")]
    InvalidKeyTime(f64),

    // ========================================================================
    // Undo/Redo Errors
    // ========================================================================
    /// A transaction is already open.
    #[error("Transaction already open: {0}")]
    TransactionOpen(String),

    /// No transaction is open.
    #[error("No open transaction")]
    NoTransaction,

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// Keys in persisted data are out of order or duplicated.
    #[error("Key {index} at time {time} is not after previous time {previous}")]
    KeyOrder {
        /// Index of the offending key
        index: usize,
        /// Time of the offending key
        time: f64,
        /// Time of the key before it
        previous: f64,
    },

    /// Structurally invalid persisted data.
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, RigError>`.
pub type Result<T> = std::result::Result<T, RigError>;
