//! Graph Settings
//!
//! Tunables shared by every operator in an [`OperatorGraph`](crate::graph::OperatorGraph).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_rig::{GraphSettings, OperatorGraph};
//!
//! // Defaults: 40 CCD iterations, 50 Hz drivers
//! let graph = OperatorGraph::new();
//!
//! // Fewer solver iterations for a preview viewport
//! let graph = OperatorGraph::with_settings(GraphSettings {
//!     ik_iterations: 12,
//!     ..Default::default()
//! });
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Evaluation settings for an operator graph.
///
/// Missing fields fall back to [`GraphSettings::default`] when deserialized,
/// so partial overrides such as `{"ik_iterations": 20}` are valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// CCD iterations for solvers that do not set their own count.
    pub ik_iterations: u32,

    /// Sample rate of periodic drivers (RPM timers), in Hz.
    pub driver_rate_hz: f64,

    /// Maximum number of timer ticks fired for one task in a single
    /// [`advance`](crate::graph::OperatorGraph::advance). Excess ticks are dropped
    /// so a long stall does not replay seconds of motion in one frame.
    pub max_catch_up_ticks: u32,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            ik_iterations: 40,
            driver_rate_hz: 50.0,
            max_catch_up_ticks: 8,
        }
    }
}

impl GraphSettings {
    /// Parses settings from a JSON string, filling unspecified fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Period of one driver tick, in seconds.
    #[inline]
    #[must_use]
    pub fn driver_period(&self) -> f64 {
        if self.driver_rate_hz > 0.0 {
            1.0 / self.driver_rate_hz
        } else {
            1.0 / GraphSettings::default().driver_rate_hz
        }
    }
}
