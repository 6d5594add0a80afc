//! Data-driven clips and an in-memory motion set.
//!
//! [`ClipMotion`] stores per-joint TRS keys in seconds and samples them with
//! linear translation/scale and shortest-arc NLERP rotation. It is the
//! reference [`Motion`] used by fixtures, tests, and adapters that do not
//! bring their own clip format.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::BlendSpaceError;
use crate::motion::{Motion, MotionExtractionFlags, MotionSet, SyncTrack};
use crate::pose::{normalize_quat, Pose, Transform};

#[inline]
fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

/// Quaternion NLERP with shortest-arc correction.
#[inline]
fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    let d = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];
    if d < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    normalize_quat([
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ])
}

/// One key of a joint track, in clip seconds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransformKey {
    pub time: f32,
    pub transform: Transform,
}

/// Keys for one joint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JointTrack {
    pub joint: usize,
    pub keys: Vec<TransformKey>,
}

impl JointTrack {
    /// Find the key pair bracketing `time` as (i, i+1, local_t).
    /// Before the first key or after the last key the nearest key is held.
    fn find_segment(&self, time: f32) -> (usize, usize, f32) {
        let keys = &self.keys;
        let n = keys.len();
        if n <= 1 || time <= keys[0].time {
            return (0, 0, 0.0);
        }
        if time >= keys[n - 1].time {
            return (n - 1, n - 1, 0.0);
        }
        for i in 0..(n - 1) {
            let t0 = keys[i].time;
            let t1 = keys[i + 1].time;
            if time >= t0 && time <= t1 {
                let denom = (t1 - t0).max(f32::EPSILON);
                return (i, i + 1, ((time - t0) / denom).clamp(0.0, 1.0));
            }
        }
        (n - 1, n - 1, 0.0)
    }

    /// Sample the track at `time`; `None` when it has no keys.
    pub fn sample(&self, time: f32) -> Option<Transform> {
        if self.keys.is_empty() {
            return None;
        }
        let (i0, i1, t) = self.find_segment(time);
        let a = &self.keys[i0].transform;
        if i0 == i1 {
            return Some(*a);
        }
        let b = &self.keys[i1].transform;
        Some(Transform {
            translation: lerp_vec3(a.translation, b.translation, t),
            rotation: nlerp_quat(a.rotation, b.rotation, t),
            scale: lerp_vec3(a.scale, b.scale, t),
        })
    }
}

/// Keyframed clip.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClipMotion {
    pub id: String,
    /// Duration in seconds.
    pub duration: f32,
    #[serde(default)]
    pub tracks: Vec<JointTrack>,
    #[serde(default)]
    pub sync_track: Option<SyncTrack>,
    #[serde(default)]
    pub extraction: MotionExtractionFlags,
    /// Joint carrying root motion.
    #[serde(default)]
    pub root_joint: usize,
}

impl ClipMotion {
    pub fn new(id: impl Into<String>, duration: f32) -> Self {
        Self {
            id: id.into(),
            duration,
            tracks: Vec::new(),
            sync_track: None,
            extraction: MotionExtractionFlags::default(),
            root_joint: 0,
        }
    }

    pub fn with_track(mut self, joint: usize, keys: Vec<TransformKey>) -> Self {
        self.tracks.push(JointTrack { joint, keys });
        self
    }

    /// Two-key root track moving from `from` to `to` over the clip.
    pub fn with_root_travel(self, from: [f32; 3], to: [f32; 3]) -> Self {
        let root = self.root_joint;
        let duration = self.duration;
        self.with_track(
            root,
            vec![
                TransformKey {
                    time: 0.0,
                    transform: Transform::from_translation(from),
                },
                TransformKey {
                    time: duration,
                    transform: Transform::from_translation(to),
                },
            ],
        )
    }

    pub fn with_sync_events(mut self, events: Vec<f32>) -> Self {
        self.sync_track = Some(SyncTrack::new(events));
        self
    }

    pub fn with_extraction(mut self, flags: MotionExtractionFlags) -> Self {
        self.extraction = flags;
        self
    }

    pub fn from_json(s: &str) -> Result<Self, BlendSpaceError> {
        let clip: ClipMotion =
            serde_json::from_str(s).map_err(|e| BlendSpaceError::InvalidClip(e.to_string()))?;
        clip.validate_basic()?;
        Ok(clip)
    }

    /// Validate basic invariants (positive duration, ordered keys inside the clip).
    pub fn validate_basic(&self) -> Result<(), BlendSpaceError> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(BlendSpaceError::InvalidClip(format!(
                "clip '{}' duration must be > 0",
                self.id
            )));
        }
        for track in &self.tracks {
            let mut last = -f32::INFINITY;
            for key in &track.keys {
                if !key.time.is_finite() || key.time < 0.0 || key.time > self.duration {
                    return Err(BlendSpaceError::InvalidClip(format!(
                        "key time must be finite and within the clip for joint {} of '{}'",
                        track.joint, self.id
                    )));
                }
                if key.time < last {
                    return Err(BlendSpaceError::InvalidClip(format!(
                        "key times must be non-decreasing for joint {} of '{}'",
                        track.joint, self.id
                    )));
                }
                last = key.time;
            }
        }
        Ok(())
    }
}

impl Motion for ClipMotion {
    fn id(&self) -> &str {
        &self.id
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn sync_track(&self) -> Option<&SyncTrack> {
        self.sync_track.as_ref().filter(|t| !t.is_empty())
    }

    fn motion_extraction_flags(&self) -> MotionExtractionFlags {
        self.extraction
    }

    fn sample(&self, time: f32, _rest: &Pose, out: &mut Pose) {
        for track in &self.tracks {
            if let (Some(slot), Some(value)) = (out.joints.get_mut(track.joint), track.sample(time)) {
                *slot = value;
            }
        }
    }

    fn sample_root(&self, time: f32) -> Transform {
        self.tracks
            .iter()
            .find(|t| t.joint == self.root_joint)
            .and_then(|t| t.sample(time))
            .unwrap_or(Transform::IDENTITY)
    }
}

/// Motion set backed by a map of shared clips.
#[derive(Default, Debug)]
pub struct InMemoryMotionSet {
    motions: HashMap<String, Arc<dyn Motion>>,
}

impl InMemoryMotionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip under its own id, replacing any previous clip with that id.
    pub fn insert<M: Motion + 'static>(&mut self, motion: M) {
        self.insert_arc(Arc::new(motion));
    }

    pub fn insert_arc(&mut self, motion: Arc<dyn Motion>) {
        self.motions.insert(motion.id().to_string(), motion);
    }

    pub fn remove(&mut self, motion_id: &str) -> Option<Arc<dyn Motion>> {
        self.motions.remove(motion_id)
    }

    pub fn len(&self) -> usize {
        self.motions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }
}

impl MotionSet for InMemoryMotionSet {
    fn find_motion(&self, motion_id: &str) -> Option<Arc<dyn Motion>> {
        self.motions.get(motion_id).cloned()
    }
}
