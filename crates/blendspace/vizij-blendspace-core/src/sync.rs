//! Playback advancement and synchronization of the blended motions.
//!
//! The blend space only picks a master motion and hands every [`MotionInfo`]
//! to a [`PlaybackSynchronizer`]; afterwards it publishes the master's timing
//! as the node's [`PlaybackTiming`]. [`DefaultSynchronizer`] is the policy
//! used unless an adapter installs its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SyncMode;
use crate::motion::{MotionInfo, SyncTrack};
use crate::segment::BlendInfo;

/// Externally visible timing of a blend space for one context.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaybackTiming {
    pub duration: f32,
    pub current_time: f32,
    pub sync_track: Option<SyncTrack>,
    pub sync_index: Option<usize>,
    pub pre_sync_time: f32,
    pub play_speed: f32,
}

impl PlaybackTiming {
    pub fn from_info(info: &MotionInfo) -> Self {
        Self {
            duration: info.duration(),
            current_time: info.current_time,
            sync_track: info.instance.sync_track().cloned(),
            sync_index: info.sync_index,
            pre_sync_time: info.pre_sync_time,
            play_speed: info.play_speed,
        }
    }
}

/// Advances and synchronizes motion playback once per tick.
pub trait PlaybackSynchronizer: fmt::Debug + Send + Sync {
    /// `master_idx` indexes `infos`; `blend_infos` holds this tick's weights.
    fn synchronize(
        &self,
        dt: f32,
        mode: SyncMode,
        master_idx: usize,
        blend_infos: &[BlendInfo],
        infos: &mut [MotionInfo],
    );
}

/// Looping playback with optional clip- or track-based following.
///
/// Every motion advances by `dt * speed` and wraps at its duration. When
/// syncing, the master plays at the rate of the weight-blended cycle length
/// of the active motions, and each follower is then moved onto the master's
/// phase: its normalized time (`ClipBased`), or its sync-track segment and
/// fraction (`TrackBased`, which falls back to clip-based unless every motion
/// has a sync track).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSynchronizer;

impl DefaultSynchronizer {
    /// Master speed multiplier making its cycle last the blended duration.
    fn blended_speed_factor(master_duration: f32, blend_infos: &[BlendInfo], infos: &[MotionInfo]) -> f32 {
        let (sum, total_weight) = blend_infos
            .iter()
            .filter_map(|b| infos.get(b.motion_index).map(|info| (info.duration(), b.weight)))
            .fold((0.0f32, 0.0f32), |(sum, tw), (d, w)| (sum + d * w, tw + w));
        if total_weight <= 0.0 || sum <= 0.0 || master_duration <= 0.0 {
            return 1.0;
        }
        master_duration / (sum / total_weight)
    }

    fn advance(info: &mut MotionInfo, speed: f32, dt: f32) {
        info.play_speed = speed;
        let next = info.current_time + dt * speed;
        info.set_time(next);
        info.pre_sync_time = info.current_time;
    }

    fn follow_clip(info: &mut MotionInfo, master_phase: f32, master_duration: f32, master_speed: f32) {
        let duration = info.duration();
        info.set_time(master_phase * duration);
        info.play_speed = master_speed * duration / master_duration;
    }

    fn follow_track(info: &mut MotionInfo, segment: (usize, f32), master_segment_len: f32, master_speed: f32) {
        let duration = info.duration();
        let Some(track) = info.instance.sync_track().cloned() else {
            return;
        };
        let (index, fraction) = segment;
        if let Some(time) = track.time_in_segment(index, fraction, duration) {
            info.set_time(time);
        }
        if let Some(len) = track.segment_length(index, duration) {
            if master_segment_len > 0.0 {
                info.play_speed = master_speed * len / master_segment_len;
            }
        }
    }
}

impl PlaybackSynchronizer for DefaultSynchronizer {
    fn synchronize(
        &self,
        dt: f32,
        mode: SyncMode,
        master_idx: usize,
        blend_infos: &[BlendInfo],
        infos: &mut [MotionInfo],
    ) {
        let syncing = mode != SyncMode::Disabled && infos.len() > 1 && master_idx < infos.len();
        if !syncing {
            for info in infos.iter_mut() {
                let speed = info.instance.play_speed();
                Self::advance(info, speed, dt);
            }
            return;
        }

        let master_duration = infos[master_idx].duration();
        let factor = Self::blended_speed_factor(master_duration, blend_infos, infos);
        for (i, info) in infos.iter_mut().enumerate() {
            let speed = info.instance.play_speed();
            let speed = if i == master_idx { speed * factor } else { speed };
            Self::advance(info, speed, dt);
        }

        let master = &infos[master_idx];
        if master_duration <= 0.0 {
            return;
        }
        let master_time = master.current_time;
        let master_speed = master.play_speed;
        let master_track = master.instance.sync_track().cloned();

        let track_based = mode == SyncMode::TrackBased
            && infos.iter().all(|info| info.instance.sync_track().is_some());
        let master_segment = master_track
            .as_ref()
            .filter(|_| track_based)
            .and_then(|track| {
                let segment = track.find_segment(master_time, master_duration)?;
                let len = track.segment_length(segment.0, master_duration)?;
                Some((segment, len))
            });

        for (i, info) in infos.iter_mut().enumerate() {
            if i == master_idx {
                continue;
            }
            match master_segment {
                Some((segment, len)) => Self::follow_track(info, segment, len, master_speed),
                None => Self::follow_clip(info, master_time / master_duration, master_duration, master_speed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipMotion;
    use crate::motion::MotionInstance;
    use std::sync::Arc;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-4, "left={a} right={b}");
    }

    fn info(clip: ClipMotion) -> MotionInfo {
        let mut inst = MotionInstance::new(Arc::new(clip));
        inst.init_for_sampling();
        inst.unpause();
        MotionInfo::new(inst)
    }

    fn full_weight(idx: usize) -> Vec<BlendInfo> {
        vec![BlendInfo {
            motion_index: idx,
            weight: 1.0,
        }]
    }

    #[test]
    fn disabled_sync_advances_each_motion_independently_and_loops() {
        let mut infos = vec![info(ClipMotion::new("a", 1.0)), info(ClipMotion::new("b", 4.0))];
        DefaultSynchronizer.synchronize(1.5, SyncMode::Disabled, 0, &full_weight(0), &mut infos);
        approx(infos[0].current_time, 0.5);
        approx(infos[1].current_time, 1.5);
        approx(infos[0].pre_sync_time, 0.5);
        approx(infos[1].play_speed, 1.0);
    }

    #[test]
    fn clip_sync_matches_normalized_time_of_master() {
        let mut infos = vec![info(ClipMotion::new("a", 1.0)), info(ClipMotion::new("b", 4.0))];
        DefaultSynchronizer.synchronize(0.25, SyncMode::ClipBased, 0, &full_weight(0), &mut infos);
        approx(infos[0].current_time, 0.25);
        approx(infos[1].current_time, 1.0);
        // Free advance before sync is still reported.
        approx(infos[1].pre_sync_time, 0.25);
        approx(infos[1].play_speed, 4.0);
    }

    #[test]
    fn master_plays_at_blended_cycle_rate() {
        let mut infos = vec![info(ClipMotion::new("a", 1.0)), info(ClipMotion::new("b", 3.0))];
        let blend = vec![
            BlendInfo {
                motion_index: 0,
                weight: 0.5,
            },
            BlendInfo {
                motion_index: 1,
                weight: 0.5,
            },
        ];
        // Blended cycle = 2s, so the 1s master runs at half speed.
        DefaultSynchronizer.synchronize(0.5, SyncMode::ClipBased, 0, &blend, &mut infos);
        approx(infos[0].play_speed, 0.5);
        approx(infos[0].current_time, 0.25);
        approx(infos[1].current_time, 0.75);
    }

    #[test]
    fn track_sync_aligns_event_segments() {
        let mut infos = vec![
            info(ClipMotion::new("walk", 1.0).with_sync_events(vec![0.0, 0.5])),
            info(ClipMotion::new("limp", 2.0).with_sync_events(vec![0.0, 1.5])),
        ];
        DefaultSynchronizer.synchronize(0.25, SyncMode::TrackBased, 0, &full_weight(0), &mut infos);
        // Master is half way through segment 0 ([0, 0.5]); follower segment 0 is [0, 1.5].
        approx(infos[1].current_time, 0.75);
        assert_eq!(infos[1].sync_index, Some(0));
        approx(infos[1].play_speed, 3.0);

        DefaultSynchronizer.synchronize(0.5, SyncMode::TrackBased, 0, &full_weight(0), &mut infos);
        // Master at 0.75: half way through segment 1 ([0.5, 1.0]); follower segment 1 is [1.5, 2.0].
        approx(infos[1].current_time, 1.75);
        assert_eq!(infos[1].sync_index, Some(1));
    }

    #[test]
    fn track_sync_falls_back_to_clip_sync_without_tracks() {
        let mut infos = vec![
            info(ClipMotion::new("walk", 1.0).with_sync_events(vec![0.0, 0.5])),
            info(ClipMotion::new("run", 2.0)),
        ];
        DefaultSynchronizer.synchronize(0.25, SyncMode::TrackBased, 0, &full_weight(0), &mut infos);
        approx(infos[1].current_time, 0.5);
    }

    #[test]
    fn timing_is_copied_from_info() {
        let mut infos = vec![info(ClipMotion::new("walk", 2.0).with_sync_events(vec![0.0, 1.0]))];
        DefaultSynchronizer.synchronize(1.25, SyncMode::Disabled, 0, &full_weight(0), &mut infos);
        let timing = PlaybackTiming::from_info(&infos[0]);
        approx(timing.duration, 2.0);
        approx(timing.current_time, 1.25);
        assert_eq!(timing.sync_index, Some(1));
        assert_eq!(timing.sync_track.map(|t| t.len()), Some(2));
    }
}
