//! Local-space poses, weighted accumulation, and the scratch pose pool.
//!
//! A [`Pose`] is a flat list of joint TRS transforms (quaternions are x,y,z,w,
//! Y is up). Blending follows the accumulate-then-normalize model: a zeroed
//! pose receives `pose * weight` contributions and the rotations are
//! renormalized once at the end.

use serde::{Deserialize, Serialize};

use crate::motion::MotionExtractionFlags;

pub const IDENTITY_QUAT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[inline]
fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Normalize a quaternion; a zero quaternion becomes identity.
#[inline]
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        [q[0] * inv_len, q[1] * inv_len, q[2] * inv_len, q[3] * inv_len]
    } else {
        IDENTITY_QUAT
    }
}

/// Hamilton product `a * b`.
#[inline]
pub fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [
        a[3] * b[0] + a[0] * b[3] + a[1] * b[2] - a[2] * b[1],
        a[3] * b[1] - a[0] * b[2] + a[1] * b[3] + a[2] * b[0],
        a[3] * b[2] + a[0] * b[1] - a[1] * b[0] + a[2] * b[3],
        a[3] * b[3] - a[0] * b[0] - a[1] * b[1] - a[2] * b[2],
    ]
}

#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Rotation about the vertical axis contained in `q` (swing-twist split).
#[inline]
pub fn yaw_twist(q: [f32; 4]) -> [f32; 4] {
    normalize_quat([0.0, q[1], 0.0, q[3]])
}

/// Yaw angle in radians of `q` around +Y.
#[inline]
pub fn yaw_angle(q: [f32; 4]) -> f32 {
    let t = yaw_twist(q);
    2.0 * t[1].atan2(t[3])
}

/// Local transform of one joint.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0; 3],
        rotation: IDENTITY_QUAT,
        scale: [1.0; 3],
    };

    pub const ZERO: Transform = Transform {
        translation: [0.0; 3],
        rotation: [0.0; 4],
        scale: [0.0; 3],
    };

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Add `other * weight`. The rotation is sign-aligned to the running sum so
    /// antipodal quaternions do not cancel.
    fn add_weighted(&mut self, other: &Transform, weight: f32) {
        for i in 0..3 {
            self.translation[i] += other.translation[i] * weight;
            self.scale[i] += other.scale[i] * weight;
        }
        let sign = if dot4(self.rotation, other.rotation) < 0.0 {
            -1.0
        } else {
            1.0
        };
        for i in 0..4 {
            self.rotation[i] += other.rotation[i] * weight * sign;
        }
    }
}

/// A local-space pose over a fixed joint count.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    pub joints: Vec<Transform>,
    /// Joint carrying root motion; target of motion extraction compensation.
    #[serde(default)]
    pub motion_extraction_joint: Option<usize>,
}

impl Pose {
    /// Identity pose with `joint_count` joints.
    pub fn identity(joint_count: usize) -> Self {
        Self {
            joints: vec![Transform::IDENTITY; joint_count],
            motion_extraction_joint: None,
        }
    }

    pub fn with_motion_extraction_joint(mut self, joint: usize) -> Self {
        self.motion_extraction_joint = Some(joint);
        self
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Reset this pose to `rest`, reusing the allocation.
    pub fn init_from(&mut self, rest: &Pose) {
        self.joints.clear();
        self.joints.extend_from_slice(&rest.joints);
        self.motion_extraction_joint = rest.motion_extraction_joint;
    }

    /// Zero every component, preparing the pose for weighted accumulation.
    pub fn zero(&mut self) {
        for joint in &mut self.joints {
            *joint = Transform::ZERO;
        }
    }

    /// `self += other * weight` joint by joint. Extra joints on either side are ignored.
    pub fn sum(&mut self, other: &Pose, weight: f32) {
        for (dst, src) in self.joints.iter_mut().zip(other.joints.iter()) {
            dst.add_weighted(src, weight);
        }
    }

    /// Renormalize every rotation after accumulation.
    pub fn normalize_quaternions(&mut self) {
        for joint in &mut self.joints {
            joint.rotation = normalize_quat(joint.rotation);
        }
    }

    /// Remove root motion from the extraction joint so it can be applied
    /// separately: planar translation and heading go back to the rest pose,
    /// and so does height when the motion captures it.
    pub fn compensate_for_motion_extraction(&mut self, rest: &Pose, flags: MotionExtractionFlags) {
        let Some(j) = self.motion_extraction_joint else {
            return;
        };
        let (Some(joint), Some(rest_joint)) = (self.joints.get_mut(j), rest.joints.get(j)) else {
            return;
        };
        joint.translation[0] = rest_joint.translation[0];
        joint.translation[2] = rest_joint.translation[2];
        if flags.capture_height {
            joint.translation[1] = rest_joint.translation[1];
        }
        let rotation = normalize_quat(joint.rotation);
        let swing = quat_mul(rotation, quat_conjugate(yaw_twist(rotation)));
        joint.rotation = normalize_quat(quat_mul(yaw_twist(rest_joint.rotation), swing));
    }
}

/// Scratch pose pool owned by one evaluation context.
///
/// Every pose handed out by [`PosePool::acquire`] must come back through
/// [`PosePool::release`]; `in_use()` lets callers and tests check the balance.
#[derive(Debug, Default)]
pub struct PosePool {
    free: Vec<Pose>,
    in_use: usize,
}

impl PosePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a scratch pose initialized from `rest`.
    pub fn acquire(&mut self, rest: &Pose) -> Pose {
        self.in_use += 1;
        match self.free.pop() {
            Some(mut pose) => {
                pose.init_from(rest);
                pose
            }
            None => rest.clone(),
        }
    }

    pub fn release(&mut self, pose: Pose) {
        debug_assert!(self.in_use > 0, "released a pose that was never acquired");
        self.in_use = self.in_use.saturating_sub(1);
        self.free.push(pose);
    }

    #[inline]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}
