//! Per-context cached state of a blend space node.

use crate::motion::MotionInfo;
use crate::segment::{range_max, range_min, BlendInfo, Segment};
use crate::sync::PlaybackTiming;

/// Progress of the current tick for one context.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TickStage {
    #[default]
    Cleared,
    Positioned,
    SegmentLocated,
    WeightsComputed,
    SyncApplied,
    /// Node disabled: the output is the rest pose and nothing else ran.
    BindPose,
}

/// Derived cache for one evaluation context. Rebuilt from scratch whenever
/// the node configuration changes; never patched in place by setters.
///
/// `motion_infos`, `motion_coordinates` and `config_indices` are index
/// aligned; `sorted_motions` is a permutation of `0..len` ordering the
/// coordinates ascending.
#[derive(Clone, Debug, Default)]
pub struct UniqueData {
    pub motion_infos: Vec<MotionInfo>,
    pub motion_coordinates: Vec<f32>,
    /// Index of each retained motion in the node's configured motion list.
    pub config_indices: Vec<usize>,
    pub sorted_motions: Vec<usize>,
    pub master_motion_idx: usize,
    pub has_overlapping_coordinates: bool,
    pub all_motions_have_sync_tracks: bool,

    pub current_position: f32,
    pub current_segment: Option<Segment>,
    pub blend_infos: Vec<BlendInfo>,
    pub timing: PlaybackTiming,
    pub stage: TickStage,
    /// Diagnostic only: something degraded this context's output.
    pub has_error: bool,

    /// Configuration revision this cache was built from; `None` until the
    /// first successful rebuild.
    pub(crate) revision: Option<u64>,
}

impl UniqueData {
    #[inline]
    pub fn motion_count(&self) -> usize {
        self.motion_infos.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.motion_infos.is_empty()
    }

    pub fn range_min(&self) -> f32 {
        range_min(&self.motion_coordinates, &self.sorted_motions)
    }

    pub fn range_max(&self) -> f32 {
        range_max(&self.motion_coordinates, &self.sorted_motions)
    }

    /// Reset per-tick results before recomputing them.
    pub fn clear(&mut self) {
        self.current_segment = None;
        self.blend_infos.clear();
        self.stage = TickStage::Cleared;
        self.has_error = false;
    }

    /// Motion index that timing is read from.
    pub fn timing_source_idx(&self, sync_enabled: bool) -> usize {
        if sync_enabled && self.master_motion_idx < self.motion_infos.len() {
            self.master_motion_idx
        } else {
            0
        }
    }

    /// Rewind every motion to the start of its clip.
    pub fn rewind(&mut self) {
        for info in &mut self.motion_infos {
            info.rewind();
        }
    }
}
