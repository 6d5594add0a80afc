//! BlendSpace1DNode: configuration ownership and the per-tick pipeline.
//!
//! Methods:
//! - new, setters (each edit bumps the configuration revision)
//! - update (rebuild if stale → position → segment → weights → sync)
//! - output (compose the blended pose), evaluate (update + output)
//! - rewind, compute/restore motion coordinates, per-context cache access

use std::sync::Arc;

use hashbrown::HashMap;
use log::warn;

use crate::compositor::compose;
use crate::config::{BlendSpace1DConfig, BlendSpaceMotion, CalculationMethod, SyncMode};
use crate::error::BlendSpaceError;
use crate::evaluator::{CoordinateEvaluator, EvaluatorRegistry};
use crate::ids::ContextId;
use crate::motion::MotionSet;
use crate::organizer::rebuild;
use crate::pose::{Pose, PosePool};
use crate::segment::{compute_blend_infos, locate_segment};
use crate::sync::{DefaultSynchronizer, PlaybackSynchronizer, PlaybackTiming};
use crate::unique_data::{TickStage, UniqueData};

/// One evaluation context (e.g. a character instance) driving a node.
#[derive(Debug)]
pub struct AnimContext {
    pub id: ContextId,
    /// Source of clips; without it the context cannot be evaluated.
    pub motion_set: Option<Arc<dyn MotionSet>>,
    pub rest_pose: Pose,
    /// Whether this context applies root motion separately.
    pub motion_extraction_enabled: bool,
    pub pose_pool: PosePool,
}

impl AnimContext {
    pub fn new(id: ContextId, rest_pose: Pose) -> Self {
        Self {
            id,
            motion_set: None,
            rest_pose,
            motion_extraction_enabled: false,
            pose_pool: PosePool::new(),
        }
    }

    pub fn with_motion_set(mut self, motion_set: Arc<dyn MotionSet>) -> Self {
        self.motion_set = Some(motion_set);
        self
    }

    pub fn with_motion_extraction(mut self, enabled: bool) -> Self {
        self.motion_extraction_enabled = enabled;
        self
    }
}

/// A one-dimensional blend space shared by any number of contexts.
///
/// Per-context caches live inside the node and every tick takes `&mut self`
/// (a tick also records unresolved entries in the configuration). Contexts
/// evaluated on different threads each need their own node, built from the
/// same configuration and sharing the `Arc` registry and motion sets.
#[derive(Debug)]
pub struct BlendSpace1DNode {
    config: BlendSpace1DConfig,
    registry: Arc<EvaluatorRegistry>,
    evaluator: CoordinateEvaluator,
    synchronizer: Box<dyn PlaybackSynchronizer>,
    /// Position set interactively (editor preview); overrides the input.
    interactive_position: Option<f32>,
    revision: u64,
    contexts: HashMap<ContextId, UniqueData>,
}

impl BlendSpace1DNode {
    /// Create a node, resolving the configured evaluator against `registry`.
    pub fn new(
        config: BlendSpace1DConfig,
        registry: Arc<EvaluatorRegistry>,
    ) -> Result<Self, BlendSpaceError> {
        let evaluator = CoordinateEvaluator::from_config(&config, &registry)?;
        Ok(Self {
            config,
            registry,
            evaluator,
            synchronizer: Box::new(DefaultSynchronizer),
            interactive_position: None,
            revision: 0,
            contexts: HashMap::new(),
        })
    }

    /// Replace the playback synchronization policy.
    pub fn with_synchronizer(mut self, synchronizer: Box<dyn PlaybackSynchronizer>) -> Self {
        self.synchronizer = synchronizer;
        self
    }

    pub fn config(&self) -> &BlendSpace1DConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &CoordinateEvaluator {
        &self.evaluator
    }

    pub fn axis_label(&self) -> &str {
        self.evaluator.axis_label()
    }

    /// Current configuration revision; bumps on every configuration change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn config_changed(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn set_motions(&mut self, motions: Vec<BlendSpaceMotion>) {
        self.config.motions = motions;
        self.config_changed();
    }

    pub fn set_calculation_method(&mut self, method: CalculationMethod) -> Result<(), BlendSpaceError> {
        let mut config = self.config.clone();
        config.calculation_method = method;
        self.evaluator = CoordinateEvaluator::from_config(&config, &self.registry)?;
        self.config = config;
        self.config_changed();
        Ok(())
    }

    /// Select the automatic evaluator by registry key (`None` or `"none"` for no evaluator).
    pub fn set_evaluator(&mut self, key: Option<&str>) -> Result<(), BlendSpaceError> {
        let mut config = self.config.clone();
        config.evaluator = key.map(str::to_string);
        self.evaluator = CoordinateEvaluator::from_config(&config, &self.registry)?;
        self.config = config;
        self.config_changed();
        Ok(())
    }

    /// Sync mode is read every tick; caches stay valid.
    pub fn set_sync_mode(&mut self, mode: SyncMode) {
        self.config.sync_mode = mode;
    }

    pub fn set_sync_master_motion_id(&mut self, motion_id: impl Into<String>) {
        self.config.sync_master_motion_id = motion_id.into();
        self.config_changed();
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.config.disabled = disabled;
    }

    /// Place a configured motion manually at `x`.
    pub fn set_motion_coordinate(&mut self, motion_id: &str, x: f32) -> Result<(), BlendSpaceError> {
        let idx = self
            .config
            .motion_index(motion_id)
            .ok_or_else(|| BlendSpaceError::UnknownMotion(motion_id.to_string()))?;
        let entry = &mut self.config.motions[idx];
        entry.x = x;
        entry.x_set_by_user = true;
        self.config_changed();
        Ok(())
    }

    /// Override the query position for every context (interactive preview).
    pub fn set_current_position(&mut self, position: f32) {
        self.interactive_position = Some(position);
    }

    pub fn clear_current_position(&mut self) {
        self.interactive_position = None;
    }

    pub fn interactive_position(&self) -> Option<f32> {
        self.interactive_position
    }

    pub fn unique_data(&self, context: ContextId) -> Option<&UniqueData> {
        self.contexts.get(&context)
    }

    /// Drop the cached state of a context that no longer exists.
    pub fn remove_context(&mut self, context: ContextId) -> Option<UniqueData> {
        self.contexts.remove(&context)
    }

    /// Rebuild the context's cache now, regardless of its revision.
    pub fn update_motion_infos(&mut self, ctx: &AnimContext) -> Result<(), BlendSpaceError> {
        let rebuilt = rebuild(
            &self.config,
            &self.evaluator,
            ctx.motion_set.as_deref(),
            self.revision,
        )?;
        for (entry, invalid) in self.config.motions.iter_mut().zip(rebuilt.invalid) {
            entry.invalid = invalid;
        }
        self.contexts.insert(ctx.id, rebuilt.data);
        Ok(())
    }

    /// Rebuild the context's cache if it is missing or built from an older revision.
    fn ensure_current(&mut self, ctx: &AnimContext) -> Result<(), BlendSpaceError> {
        let stale = self
            .contexts
            .get(&ctx.id)
            .map_or(true, |data| data.revision != Some(self.revision));
        if stale {
            self.update_motion_infos(ctx)?;
        }
        Ok(())
    }

    /// Advance one tick for `ctx`.
    ///
    /// `input` is the value driving the blend axis, if anything is connected.
    /// Problems never abort the tick; they show up as
    /// [`UniqueData::has_error`] and a rest pose or boundary clamp.
    pub fn update(&mut self, ctx: &AnimContext, dt: f32, input: Option<f32>) -> &UniqueData {
        if self.config.disabled {
            let data = self.contexts.entry(ctx.id).or_default();
            data.clear();
            data.stage = TickStage::BindPose;
            return data;
        }

        // Checked every tick: a detached motion set does not bump the revision.
        let ready = if ctx.motion_set.is_none() {
            warn!("blend space context {:?} not ready: no motion set", ctx.id);
            false
        } else {
            match self.ensure_current(ctx) {
                Ok(()) => true,
                Err(err) => {
                    warn!("blend space context {:?} not ready: {err}", ctx.id);
                    false
                }
            }
        };

        let sync_mode = self.config.sync_mode;
        let interactive_position = self.interactive_position;
        let synchronizer = &self.synchronizer;
        let data = self.contexts.entry(ctx.id).or_default();
        data.clear();
        data.has_error = !ready;

        data.current_position = match (interactive_position, input) {
            (Some(position), _) => position,
            (None, Some(value)) => value,
            (None, None) => {
                // Nothing drives the axis: sit in the middle of the range.
                data.has_error = true;
                (data.range_min() + data.range_max()) / 2.0
            }
        };
        data.stage = TickStage::Positioned;

        if !ready {
            // The cached motions are kept for recovery but must not drive the
            // output: no weights, no playback, rest pose.
            data.timing = PlaybackTiming::default();
            return data;
        }

        data.current_segment = locate_segment(
            data.current_position,
            &data.motion_coordinates,
            &data.sorted_motions,
        );
        data.stage = TickStage::SegmentLocated;

        data.blend_infos = compute_blend_infos(
            data.current_position,
            data.current_segment,
            &data.motion_coordinates,
            &data.sorted_motions,
        );
        data.stage = TickStage::WeightsComputed;

        if data.is_empty() {
            data.has_error = true;
            data.timing = PlaybackTiming::default();
        } else {
            synchronizer.synchronize(
                dt,
                sync_mode,
                data.master_motion_idx,
                &data.blend_infos,
                &mut data.motion_infos,
            );
            let source = data.timing_source_idx(sync_mode != SyncMode::Disabled);
            data.timing = PlaybackTiming::from_info(&data.motion_infos[source]);
        }
        data.stage = TickStage::SyncApplied;
        data
    }

    /// Write the blended pose of `ctx` into `out`.
    pub fn output(&self, ctx: &mut AnimContext, out: &mut Pose) {
        if self.config.disabled {
            out.init_from(&ctx.rest_pose);
            return;
        }
        match self.contexts.get(&ctx.id) {
            Some(data) => compose(
                &data.blend_infos,
                &data.motion_infos,
                &ctx.rest_pose,
                ctx.motion_extraction_enabled,
                &mut ctx.pose_pool,
                out,
            ),
            None => out.init_from(&ctx.rest_pose),
        }
    }

    /// `update` followed by `output`.
    pub fn evaluate(&mut self, ctx: &mut AnimContext, dt: f32, input: Option<f32>, out: &mut Pose) {
        self.update(ctx, dt, input);
        self.output(ctx, out);
    }

    /// Restart every motion of `ctx` from the beginning.
    pub fn rewind(&mut self, ctx: &AnimContext) {
        if let Some(data) = self.contexts.get_mut(&ctx.id) {
            data.rewind();
        }
    }

    /// Evaluator value for one configured motion in `ctx`.
    ///
    /// Returns `Some(0.0)` when there is no automatic evaluator and `None`
    /// when the motion did not resolve in this context.
    pub fn compute_motion_coordinate(
        &mut self,
        motion_id: &str,
        ctx: &AnimContext,
    ) -> Result<Option<f32>, BlendSpaceError> {
        let config_idx = self
            .config
            .motion_index(motion_id)
            .ok_or_else(|| BlendSpaceError::UnknownMotion(motion_id.to_string()))?;
        if matches!(self.evaluator, CoordinateEvaluator::Manual) {
            return Ok(Some(0.0));
        }
        self.ensure_current(ctx)?;
        let Some(data) = self.contexts.get(&ctx.id) else {
            return Ok(None);
        };
        let Some(idx) = data.config_indices.iter().position(|&c| c == config_idx) else {
            return Ok(None);
        };
        Ok(self.evaluator.evaluate(&data.motion_infos[idx].instance))
    }

    /// In automatic mode, replace a user-placed coordinate with the computed one.
    pub fn restore_motion_coordinate(
        &mut self,
        motion_id: &str,
        ctx: &AnimContext,
    ) -> Result<(), BlendSpaceError> {
        let computed = self.compute_motion_coordinate(motion_id, ctx)?;
        if self.config.calculation_method != CalculationMethod::Auto {
            return Ok(());
        }
        if let (Some(x), Some(idx)) = (computed, self.config.motion_index(motion_id)) {
            let entry = &mut self.config.motions[idx];
            entry.x = x;
            entry.x_set_by_user = false;
            self.config_changed();
        }
        Ok(())
    }
}
