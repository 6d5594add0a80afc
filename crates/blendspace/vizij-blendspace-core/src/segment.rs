//! Segment search over sorted coordinates and blend weight computation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Interval between two adjacent sorted motions that brackets the query.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    /// Position in the sorted order of the segment's lower motion.
    pub index: usize,
    /// Fraction in [0, 1] toward the upper motion.
    pub weight_for_segment_end: f32,
}

/// One active motion and its blend weight.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BlendInfo {
    /// Index into the context's motion infos (not the sorted order).
    pub motion_index: usize,
    pub weight: f32,
}

impl BlendInfo {
    /// Canonical order: heavier entries first, ties by motion index.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .total_cmp(&self.weight)
            .then(self.motion_index.cmp(&other.motion_index))
    }
}

/// Coordinate of the lowest sorted motion (0.0 when empty).
pub fn range_min(coordinates: &[f32], sorted: &[usize]) -> f32 {
    sorted.first().map_or(0.0, |&i| coordinates[i])
}

/// Coordinate of the highest sorted motion (0.0 when empty).
pub fn range_max(coordinates: &[f32], sorted: &[usize]) -> f32 {
    sorted.last().map_or(0.0, |&i| coordinates[i])
}

/// Find the segment containing `position`.
///
/// Returns `None` with fewer than two motions or when `position` lies outside
/// the coordinate range. Adjacent pairs are scanned in ascending order and the
/// first closed interval containing the position wins; a zero-length interval
/// (overlapping coordinates) gives full weight to its lower motion.
pub fn locate_segment(position: f32, coordinates: &[f32], sorted: &[usize]) -> Option<Segment> {
    let n = sorted.len();
    if n < 2
        || position < range_min(coordinates, sorted)
        || position > range_max(coordinates, sorted)
    {
        return None;
    }
    for i in 1..n {
        let seg_start = coordinates[sorted[i - 1]];
        let seg_end = coordinates[sorted[i]];
        debug_assert!(seg_start <= seg_end, "coordinates should have been sorted");
        if position >= seg_start && position <= seg_end {
            let seg_length = seg_end - seg_start;
            let weight_for_segment_end = if seg_length <= 0.0 {
                0.0
            } else {
                (position - seg_start) / seg_length
            };
            return Some(Segment {
                index: i - 1,
                weight_for_segment_end,
            });
        }
    }
    None
}

/// Turn a located segment into blend entries.
///
/// - segment: lower motion gets `1 - f`, upper motion gets `f`
/// - no segment, some motions: the boundary motion on the query's side gets 1.0
/// - no motions: empty
///
/// The result is sorted with [`BlendInfo::canonical_cmp`].
pub fn compute_blend_infos(
    position: f32,
    segment: Option<Segment>,
    coordinates: &[f32],
    sorted: &[usize],
) -> Vec<BlendInfo> {
    let mut infos = match segment {
        Some(seg) => vec![
            BlendInfo {
                motion_index: sorted[seg.index],
                weight: 1.0 - seg.weight_for_segment_end,
            },
            BlendInfo {
                motion_index: sorted[seg.index + 1],
                weight: seg.weight_for_segment_end,
            },
        ],
        None => match (sorted.first(), sorted.last()) {
            (Some(&lowest), Some(&highest)) => {
                let motion_index = if position < range_min(coordinates, sorted) {
                    lowest
                } else {
                    highest
                };
                vec![BlendInfo {
                    motion_index,
                    weight: 1.0,
                }]
            }
            _ => Vec::new(),
        },
    };
    infos.sort_by(BlendInfo::canonical_cmp);
    infos
}
