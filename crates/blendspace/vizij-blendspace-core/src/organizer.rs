//! Building the per-context motion cache: resolution, coordinates, sorting.
//!
//! [`rebuild`] is a pure function of the configuration, the resolved
//! evaluator and the context's motion set. It returns a fresh
//! [`UniqueData`] (plus the per-entry validity it observed) and never touches
//! a previous cache, so a failed rebuild leaves the old state usable.

use log::{debug, warn};

use crate::config::BlendSpace1DConfig;
use crate::error::BlendSpaceError;
use crate::evaluator::CoordinateEvaluator;
use crate::motion::{MotionInfo, MotionInstance, MotionSet};
use crate::unique_data::UniqueData;

/// Adjacent sorted coordinates closer than this are reported as overlapping.
pub const OVERLAP_TOLERANCE: f32 = 1e-4;

/// Result of a successful rebuild.
#[derive(Debug)]
pub struct Rebuilt {
    pub data: UniqueData,
    /// Per configured motion: true when its id did not resolve.
    pub invalid: Vec<bool>,
}

/// Resolve, place, and sort the configured motions for one context.
pub fn rebuild(
    config: &BlendSpace1DConfig,
    evaluator: &CoordinateEvaluator,
    motion_set: Option<&dyn MotionSet>,
    revision: u64,
) -> Result<Rebuilt, BlendSpaceError> {
    let motion_set = motion_set.ok_or(BlendSpaceError::MissingMotionSet)?;

    let mut data = UniqueData {
        revision: Some(revision),
        ..Default::default()
    };
    data.motion_infos.reserve(config.motions.len());
    let mut invalid = Vec::with_capacity(config.motions.len());

    for (config_idx, entry) in config.motions.iter().enumerate() {
        let Some(motion) = motion_set.find_motion(&entry.motion_id) else {
            warn!(
                "blend space motion '{}' not found in motion set; skipping",
                entry.motion_id
            );
            invalid.push(true);
            continue;
        };
        invalid.push(false);

        let mut instance = MotionInstance::new(motion);
        if !instance.is_ready_for_sampling() {
            instance.init_for_sampling();
        }
        instance.unpause();
        data.motion_infos.push(MotionInfo::new(instance));
        data.config_indices.push(config_idx);

        if entry.motion_id == config.sync_master_motion_id {
            data.master_motion_idx = data.motion_infos.len() - 1;
        }
    }

    data.all_motions_have_sync_tracks = data
        .motion_infos
        .iter()
        .all(|info| info.instance.sync_track().is_some());

    data.motion_coordinates = motion_coordinates(config, evaluator, &data);
    let (sorted, overlapping) = sort_motions(&data.motion_coordinates);
    data.sorted_motions = sorted;
    data.has_overlapping_coordinates = overlapping;
    if overlapping {
        warn!("blend space has motions with overlapping coordinates; the lower sorted motion wins");
    }

    debug!(
        "rebuilt blend space cache: {} of {} motions retained (revision {})",
        data.motion_infos.len(),
        config.motions.len(),
        revision
    );
    Ok(Rebuilt { data, invalid })
}

/// Coordinates of the retained motions, aligned with `data.motion_infos`.
pub fn motion_coordinates(
    config: &BlendSpace1DConfig,
    evaluator: &CoordinateEvaluator,
    data: &UniqueData,
) -> Vec<f32> {
    data.config_indices
        .iter()
        .zip(data.motion_infos.iter())
        .map(|(&config_idx, info)| evaluator.coordinate_for(&config.motions[config_idx], &info.instance))
        .collect()
}

/// Sort motion indices by coordinate ascending (ties by index) and report
/// whether any adjacent sorted pair is within [`OVERLAP_TOLERANCE`].
pub fn sort_motions(coordinates: &[f32]) -> (Vec<usize>, bool) {
    let mut sorted: Vec<usize> = (0..coordinates.len()).collect();
    sorted.sort_by(|&a, &b| coordinates[a].total_cmp(&coordinates[b]).then(a.cmp(&b)));
    let overlapping = sorted
        .windows(2)
        .any(|w| (coordinates[w[1]] - coordinates[w[0]]).abs() < OVERLAP_TOLERANCE);
    (sorted, overlapping)
}
