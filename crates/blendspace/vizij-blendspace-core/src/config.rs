//! Persisted blend space configuration.
//!
//! The configuration is plain data owned by whoever authors the blend space.
//! [`crate::BlendSpace1DNode`] wraps it and turns every edit into a revision
//! bump so per-context caches rebuild on their next tick.

use serde::{Deserialize, Serialize};

use crate::error::BlendSpaceError;

/// How motion coordinates are computed when the user did not place them.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    /// Ask the configured parameter evaluator.
    #[default]
    Auto,
    /// Coordinates come from the config only; unset entries sit at 0.0.
    Manual,
}

/// Playback synchronization between the blended motions.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Disabled,
    /// Followers match the master's normalized play time.
    ClipBased,
    /// Followers match the master's sync-track event segment.
    TrackBased,
}

/// One motion entry of the blend space.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BlendSpaceMotion {
    pub motion_id: String,
    /// Coordinate along the blend axis.
    #[serde(default)]
    pub x: f32,
    /// When true `x` is authoritative and the evaluator is not consulted.
    #[serde(default)]
    pub x_set_by_user: bool,
    /// Set when the motion id could not be resolved in the last rebuild.
    #[serde(skip)]
    pub invalid: bool,
}

impl BlendSpaceMotion {
    /// Entry whose coordinate is computed by the evaluator.
    pub fn new(motion_id: impl Into<String>) -> Self {
        Self {
            motion_id: motion_id.into(),
            ..Default::default()
        }
    }

    /// Entry placed manually at `x`.
    pub fn at(motion_id: impl Into<String>, x: f32) -> Self {
        Self {
            motion_id: motion_id.into(),
            x,
            x_set_by_user: true,
            invalid: false,
        }
    }
}

/// Configuration of a 1D blend space node.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlendSpace1DConfig {
    pub calculation_method: CalculationMethod,
    /// Registry name of the parameter evaluator used in `Auto` mode.
    /// `None` and `"none"` both mean no automatic placement.
    pub evaluator: Option<String>,
    pub sync_mode: SyncMode,
    /// Motion id whose timing the other motions follow.
    pub sync_master_motion_id: String,
    /// A disabled node outputs the rest pose and skips all evaluation.
    pub disabled: bool,
    pub motions: Vec<BlendSpaceMotion>,
}

impl BlendSpace1DConfig {
    pub fn from_json(s: &str) -> Result<Self, BlendSpaceError> {
        serde_json::from_str(s).map_err(|e| BlendSpaceError::ConfigParse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, BlendSpaceError> {
        serde_json::to_string_pretty(self).map_err(|e| BlendSpaceError::ConfigParse(e.to_string()))
    }

    /// Index of the configured motion with `motion_id`.
    pub fn motion_index(&self, motion_id: &str) -> Option<usize> {
        self.motions.iter().position(|m| m.motion_id == motion_id)
    }
}
