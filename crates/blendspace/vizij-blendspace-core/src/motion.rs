//! Motion collaborator contracts and per-context playback state.
//!
//! Clips are owned outside the core and shared as `Arc<dyn Motion>`. Each
//! evaluation context creates its own [`MotionInstance`] per clip, and the
//! blend space keeps a [`MotionInfo`] next to it with the values the
//! synchronizer reads and writes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pose::{Pose, Transform};

/// Which parts of root motion a clip extracts.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MotionExtractionFlags {
    /// Vertical root movement is extracted too (jumps, stairs).
    #[serde(default)]
    pub capture_height: bool,
}

/// Ordered event times (seconds) inside a clip, used for track-based sync.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncTrack {
    pub events: Vec<f32>,
}

impl SyncTrack {
    pub fn new(mut events: Vec<f32>) -> Self {
        events.sort_by(f32::total_cmp);
        Self { events }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Segment `[events[i], events[i+1])` containing `time` on a looping clip
    /// of `duration`, as `(i, fraction)`. The last segment wraps past the end
    /// of the clip to the first event.
    pub fn find_segment(&self, time: f32, duration: f32) -> Option<(usize, f32)> {
        let n = self.events.len();
        if n == 0 || duration <= 0.0 {
            return None;
        }
        // Linear scan (could be optimized to binary search if needed)
        for i in 0..n {
            let start = self.events[i];
            let end = if i + 1 < n {
                self.events[i + 1]
            } else {
                self.events[0] + duration
            };
            let t = if time < start { time + duration } else { time };
            if t >= start && t < end {
                let len = end - start;
                let fraction = if len > 0.0 { (t - start) / len } else { 0.0 };
                return Some((i, fraction));
            }
        }
        Some((n - 1, 0.0))
    }

    /// Time at `fraction` through segment `index` (index wraps modulo the
    /// event count), mapped back into `[0, duration)`.
    pub fn time_in_segment(&self, index: usize, fraction: f32, duration: f32) -> Option<f32> {
        let n = self.events.len();
        if n == 0 || duration <= 0.0 {
            return None;
        }
        let i = index % n;
        let start = self.events[i];
        let end = if i + 1 < n {
            self.events[i + 1]
        } else {
            self.events[0] + duration
        };
        Some(wrap_time(start + (end - start) * fraction, duration))
    }

    /// Length in seconds of segment `index` (wrapping).
    pub fn segment_length(&self, index: usize, duration: f32) -> Option<f32> {
        let n = self.events.len();
        if n == 0 {
            return None;
        }
        let i = index % n;
        let end = if i + 1 < n {
            self.events[i + 1]
        } else {
            self.events[0] + duration
        };
        Some(end - self.events[i])
    }
}

/// Wrap `t` into `[0, duration)`; zero-length clips always sit at 0.
pub fn wrap_time(t: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    let m = t % duration;
    if m < 0.0 {
        m + duration
    } else {
        m
    }
}

/// A playable clip.
pub trait Motion: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Clip length in seconds.
    fn duration(&self) -> f32;

    fn sync_track(&self) -> Option<&SyncTrack> {
        None
    }

    fn motion_extraction_flags(&self) -> MotionExtractionFlags {
        MotionExtractionFlags::default()
    }

    /// Sample the clip at `time` into `out`, which starts as a copy of `rest`.
    /// Joints the clip does not animate keep their rest transform.
    fn sample(&self, time: f32, rest: &Pose, out: &mut Pose);

    /// Root (motion extraction joint) transform at `time`; used by parameter
    /// evaluators to measure speed, distance and turning.
    fn sample_root(&self, time: f32) -> Transform;
}

/// Resolves configured motion ids to clips.
pub trait MotionSet: fmt::Debug + Send + Sync {
    fn find_motion(&self, motion_id: &str) -> Option<Arc<dyn Motion>>;
}

/// Per-context playback of one clip.
#[derive(Clone, Debug)]
pub struct MotionInstance {
    motion: Arc<dyn Motion>,
    current_time: f32,
    play_speed: f32,
    paused: bool,
    ready_for_sampling: bool,
    motion_extraction_enabled: bool,
}

impl MotionInstance {
    pub fn new(motion: Arc<dyn Motion>) -> Self {
        Self {
            motion,
            current_time: 0.0,
            play_speed: 1.0,
            paused: true,
            ready_for_sampling: false,
            motion_extraction_enabled: true,
        }
    }

    #[inline]
    pub fn motion(&self) -> &Arc<dyn Motion> {
        &self.motion
    }

    /// Marks the instance as sampling-ready; evaluators and the compositor
    /// only read instances that went through this.
    pub fn init_for_sampling(&mut self) {
        self.ready_for_sampling = true;
    }

    #[inline]
    pub fn is_ready_for_sampling(&self) -> bool {
        self.ready_for_sampling
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.motion.duration()
    }

    #[inline]
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn set_current_time(&mut self, time: f32) {
        self.current_time = wrap_time(time, self.duration());
    }

    /// Base play speed chosen by the owner (not the sync-adjusted one).
    #[inline]
    pub fn play_speed(&self) -> f32 {
        self.play_speed
    }

    pub fn set_play_speed(&mut self, speed: f32) {
        self.play_speed = speed;
    }

    #[inline]
    pub fn sync_track(&self) -> Option<&SyncTrack> {
        self.motion.sync_track()
    }

    #[inline]
    pub fn motion_extraction_enabled(&self) -> bool {
        self.motion_extraction_enabled
    }

    pub fn set_motion_extraction_enabled(&mut self, enabled: bool) {
        self.motion_extraction_enabled = enabled;
    }

    pub fn rewind(&mut self) {
        self.current_time = 0.0;
    }

    /// Sample at the instance's current time.
    pub fn sample(&self, rest: &Pose, out: &mut Pose) {
        self.motion.sample(self.current_time, rest, out);
    }
}

/// Playback state the blend space tracks for one retained motion.
#[derive(Clone, Debug)]
pub struct MotionInfo {
    pub instance: MotionInstance,
    pub current_time: f32,
    /// Sync-track segment containing `current_time`, when the clip has one.
    pub sync_index: Option<usize>,
    /// Time after advancing but before synchronization was applied.
    pub pre_sync_time: f32,
    /// Effective speed this tick, after synchronization.
    pub play_speed: f32,
}

impl MotionInfo {
    pub fn new(instance: MotionInstance) -> Self {
        let current_time = instance.current_time();
        let play_speed = instance.play_speed();
        let sync_index = instance
            .sync_track()
            .and_then(|track| track.find_segment(current_time, instance.duration()))
            .map(|(i, _)| i);
        Self {
            instance,
            current_time,
            sync_index,
            pre_sync_time: current_time,
            play_speed,
        }
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.instance.duration()
    }

    /// Write `time` to both the info and its instance.
    pub fn set_time(&mut self, time: f32) {
        self.instance.set_current_time(time);
        self.current_time = self.instance.current_time();
        self.sync_index = self
            .instance
            .sync_track()
            .and_then(|track| track.find_segment(self.current_time, self.instance.duration()))
            .map(|(i, _)| i);
    }

    pub fn rewind(&mut self) {
        self.instance.rewind();
        self.set_time(0.0);
        self.pre_sync_time = 0.0;
        self.play_speed = self.instance.play_speed();
    }
}
