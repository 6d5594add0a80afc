//! Blending the active motions into the output pose.

use crate::motion::MotionInfo;
use crate::pose::{Pose, PosePool};
use crate::segment::BlendInfo;

/// Sample every blend entry and accumulate `pose * weight` into `out`.
///
/// `out` ends up as the rest pose when there is nothing to blend. Rotations
/// are renormalized once after all contributions. The scratch pose taken from
/// `pool` is returned before this function exits.
pub fn compose(
    blend_infos: &[BlendInfo],
    motion_infos: &[MotionInfo],
    rest: &Pose,
    motion_extraction_enabled: bool,
    pool: &mut PosePool,
    out: &mut Pose,
) {
    out.init_from(rest);
    if blend_infos.is_empty() || motion_infos.is_empty() {
        return;
    }
    out.zero();

    let mut scratch = pool.acquire(rest);
    for blend in blend_infos {
        let Some(info) = motion_infos.get(blend.motion_index) else {
            continue;
        };
        let instance = &info.instance;
        scratch.init_from(rest);
        instance.sample(rest, &mut scratch);
        if instance.motion_extraction_enabled() && motion_extraction_enabled {
            scratch.compensate_for_motion_extraction(rest, instance.motion().motion_extraction_flags());
        }
        out.sum(&scratch, blend.weight);
    }
    pool.release(scratch);

    out.normalize_quaternions();
}
