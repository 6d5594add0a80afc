use std::sync::Arc;

use vizij_blendspace_core::{
    AnimContext, BlendInfo, BlendSpace1DConfig, BlendSpace1DNode, BlendSpaceMotion,
    CalculationMethod, ClipMotion, ContextId, EvaluatorRegistry, IdAllocator, InMemoryMotionSet,
    Pose, SyncMode, TickStage, Transform, TransformKey,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn norm4(q: [f32; 4]) -> f32 {
    (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt()
}

/// Clip holding joint 1 at a constant translation.
fn posed_clip(id: &str, duration: f32, x: f32) -> ClipMotion {
    ClipMotion::new(id, duration).with_track(
        1,
        vec![TransformKey {
            time: 0.0,
            transform: Transform::from_translation([x, 0.0, 0.0]),
        }],
    )
}

fn motion_set(clips: Vec<ClipMotion>) -> Arc<InMemoryMotionSet> {
    let mut set = InMemoryMotionSet::new();
    for clip in clips {
        set.insert(clip);
    }
    Arc::new(set)
}

fn manual_config(motions: &[(&str, f32)]) -> BlendSpace1DConfig {
    BlendSpace1DConfig {
        calculation_method: CalculationMethod::Manual,
        motions: motions
            .iter()
            .map(|(id, x)| BlendSpaceMotion::at(*id, *x))
            .collect(),
        ..Default::default()
    }
}

fn node(config: BlendSpace1DConfig) -> BlendSpace1DNode {
    BlendSpace1DNode::new(config, Arc::new(EvaluatorRegistry::with_builtins()))
        .expect("config should resolve")
}

fn context(id: ContextId, set: Arc<InMemoryMotionSet>) -> AnimContext {
    AnimContext::new(id, Pose::identity(2).with_motion_extraction_joint(0)).with_motion_set(set)
}

fn abc() -> (BlendSpace1DNode, AnimContext) {
    let set = motion_set(vec![
        posed_clip("A", 1.0, 0.0),
        posed_clip("B", 1.0, 1.0),
        posed_clip("C", 1.0, 2.0),
    ]);
    let node = node(manual_config(&[("A", 0.0), ("B", 1.0), ("C", 2.0)]));
    (node, context(ContextId(0), set))
}

/// it should split weights between the two motions bracketing the query
#[test]
fn query_between_motions_blends_neighbors() {
    let (mut node, ctx) = abc();
    let data = node.update(&ctx, 0.0, Some(1.5));
    let seg = data.current_segment.expect("query inside range");
    assert_eq!(seg.index, 1);
    approx(seg.weight_for_segment_end, 0.5, 1e-6);
    assert_eq!(
        data.blend_infos,
        vec![
            BlendInfo {
                motion_index: 1,
                weight: 0.5
            },
            BlendInfo {
                motion_index: 2,
                weight: 0.5
            },
        ]
    );
    assert_eq!(data.stage, TickStage::SyncApplied);
    assert!(!data.has_error);
}

/// it should clamp to the boundary motion outside the coordinate range
#[test]
fn query_outside_range_clamps_to_boundary() {
    let (mut node, ctx) = abc();
    let data = node.update(&ctx, 0.0, Some(-1.0));
    assert!(data.current_segment.is_none());
    assert_eq!(
        data.blend_infos,
        vec![BlendInfo {
            motion_index: 0,
            weight: 1.0
        }]
    );
    let data = node.update(&ctx, 0.0, Some(7.0));
    assert_eq!(
        data.blend_infos,
        vec![BlendInfo {
            motion_index: 2,
            weight: 1.0
        }]
    );
}

/// it should flag near-equal coordinates and give the lower motion full weight
#[test]
fn overlapping_coordinates_resolve_to_lower_motion() {
    let set = motion_set(vec![posed_clip("A", 1.0, 0.0), posed_clip("B", 1.0, 1.0)]);
    let mut node = node(manual_config(&[("A", 1.0), ("B", 1.00005)]));
    let ctx = context(ContextId(0), set);
    let data = node.update(&ctx, 0.0, Some(1.0));
    assert!(data.has_overlapping_coordinates);
    let seg = data.current_segment.expect("segment located");
    assert_eq!(seg.index, 0);
    approx(seg.weight_for_segment_end, 0.0, 1e-6);
    assert_eq!(
        data.blend_infos,
        vec![
            BlendInfo {
                motion_index: 0,
                weight: 1.0
            },
            BlendInfo {
                motion_index: 1,
                weight: 0.0
            },
        ]
    );
}

/// it should sort motions configured out of order
#[test]
fn unsorted_configuration_is_sorted_by_coordinate() {
    let set = motion_set(vec![
        posed_clip("A", 1.0, 0.0),
        posed_clip("B", 1.0, 1.0),
        posed_clip("C", 1.0, 2.0),
    ]);
    let mut node = node(manual_config(&[("C", 2.0), ("A", 0.0), ("B", 1.0)]));
    let ctx = context(ContextId(0), set);
    let data = node.update(&ctx, 0.0, Some(0.25));
    assert_eq!(data.sorted_motions, vec![1, 2, 0]);
    assert!(!data.has_overlapping_coordinates);
    assert_eq!(data.blend_infos[0].motion_index, 1);
    approx(data.blend_infos[0].weight, 0.75, 1e-6);
    assert_eq!(data.blend_infos[1].motion_index, 2);
}

/// it should conserve total weight for any query
#[test]
fn weights_sum_to_one_across_sweep() {
    let (mut node, ctx) = abc();
    let mut q = -1.0;
    while q <= 3.0 {
        let data = node.update(&ctx, 0.0, Some(q));
        let total: f32 = data.blend_infos.iter().map(|b| b.weight).sum();
        approx(total, 1.0, 1e-6);
        q += 0.1;
    }
}

/// it should produce identical blend entries when nothing changed
#[test]
fn repeated_updates_are_idempotent() {
    let (mut node, ctx) = abc();
    let first = node.update(&ctx, 0.016, Some(0.4)).blend_infos.clone();
    let second = node.update(&ctx, 0.016, Some(0.4)).blend_infos.clone();
    assert_eq!(first, second);
}

/// it should output the rest pose and flag an error with no motions
#[test]
fn empty_configuration_outputs_rest_pose() {
    let mut node = node(BlendSpace1DConfig::default());
    let mut ctx = context(ContextId(0), motion_set(vec![]));
    let mut out = Pose::identity(2);
    out.joints[1].translation = [9.0, 9.0, 9.0];
    node.evaluate(&mut ctx, 0.016, Some(0.5), &mut out);
    let data = node.unique_data(ctx.id).expect("cache created");
    assert!(data.blend_infos.is_empty());
    assert!(data.has_error);
    assert_eq!(out, ctx.rest_pose);
    assert_eq!(ctx.pose_pool.in_use(), 0);
}

/// it should degrade to rest pose without a motion set and recover once one is attached
#[test]
fn missing_motion_set_is_not_ready_until_attached() {
    let mut node = node(manual_config(&[("A", 0.0), ("B", 1.0)]));
    let mut ctx = AnimContext::new(ContextId(3), Pose::identity(2));
    let mut out = Pose::identity(2);
    node.evaluate(&mut ctx, 0.016, Some(0.5), &mut out);
    assert!(node.unique_data(ctx.id).unwrap().has_error);
    assert_eq!(out, ctx.rest_pose);

    ctx.motion_set = Some(motion_set(vec![
        posed_clip("A", 1.0, 0.0),
        posed_clip("B", 1.0, 1.0),
    ]));
    node.evaluate(&mut ctx, 0.016, Some(0.5), &mut out);
    let data = node.unique_data(ctx.id).unwrap();
    assert!(!data.has_error);
    assert_eq!(data.blend_infos.len(), 2);
    approx(out.joints[1].translation[0], 0.5, 1e-5);
}

/// it should stop blending cached motions once the motion set is detached
#[test]
fn detached_motion_set_outputs_rest_pose() {
    let set = motion_set(vec![posed_clip("A", 1.0, 0.0), posed_clip("B", 1.0, 4.0)]);
    let mut node = node(manual_config(&[("A", 0.0), ("B", 1.0)]));
    let mut ctx = context(ContextId(0), set.clone());
    let mut out = Pose::default();
    node.evaluate(&mut ctx, 0.016, Some(0.75), &mut out);
    approx(out.joints[1].translation[0], 3.0, 1e-5);

    // Detached without any configuration edit.
    ctx.motion_set = None;
    node.evaluate(&mut ctx, 0.016, Some(0.75), &mut out);
    let data = node.unique_data(ctx.id).unwrap();
    assert!(data.has_error);
    assert!(data.blend_infos.is_empty());
    assert_eq!(data.timing.duration, 0.0);
    assert_eq!(out, ctx.rest_pose);

    // Detached and the configuration edited, so a rebuild is attempted and fails.
    node.set_motion_coordinate("A", -1.0).unwrap();
    node.evaluate(&mut ctx, 0.016, Some(0.5), &mut out);
    assert!(node.unique_data(ctx.id).unwrap().blend_infos.is_empty());
    assert_eq!(out, ctx.rest_pose);
    assert_eq!(ctx.pose_pool.in_use(), 0);

    ctx.motion_set = Some(set);
    node.evaluate(&mut ctx, 0.016, Some(0.5), &mut out);
    let data = node.unique_data(ctx.id).unwrap();
    assert!(!data.has_error);
    // A at -1, B at 1: query 0.5 is three quarters of the way to B.
    approx(out.joints[1].translation[0], 3.0, 1e-5);
}

/// it should let each thread drive its own node over shared clips
#[test]
fn nodes_per_thread_share_motion_sets() {
    let set = motion_set(vec![posed_clip("A", 1.0, 0.0), posed_clip("B", 1.0, 4.0)]);
    let registry = Arc::new(EvaluatorRegistry::with_builtins());
    let config = manual_config(&[("A", 0.0), ("B", 1.0)]);

    let handles: Vec<_> = [0.25f32, 0.5]
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            let mut node = BlendSpace1DNode::new(config.clone(), registry.clone())
                .expect("manual config");
            let mut ctx = context(ContextId(i as u32), set.clone());
            std::thread::spawn(move || {
                let mut out = Pose::default();
                node.evaluate(&mut ctx, 0.016, Some(q), &mut out);
                out.joints[1].translation[0]
            })
        })
        .collect();

    let xs: Vec<f32> = handles
        .into_iter()
        .map(|h| h.join().expect("thread finished"))
        .collect();
    approx(xs[0], 1.0, 1e-5);
    approx(xs[1], 2.0, 1e-5);
}

/// it should flag unresolved motion ids without failing the evaluation
#[test]
fn unresolved_motion_is_marked_invalid_and_skipped() {
    let set = motion_set(vec![posed_clip("A", 1.0, 0.0), posed_clip("C", 1.0, 2.0)]);
    let mut node = node(manual_config(&[("A", 0.0), ("B", 1.0), ("C", 2.0)]));
    let ctx = context(ContextId(0), set);
    let data = node.update(&ctx, 0.0, Some(1.0));
    assert_eq!(data.motion_count(), 2);
    assert_eq!(data.blend_infos.len(), 2);
    approx(data.blend_infos[0].weight, 0.5, 1e-6);
    let invalid: Vec<bool> = node.config().motions.iter().map(|m| m.invalid).collect();
    assert_eq!(invalid, vec![false, true, false]);
}

/// it should skip evaluation and output the rest pose when disabled
#[test]
fn disabled_node_outputs_bind_pose() {
    let (mut node, mut ctx) = abc();
    node.set_disabled(true);
    let mut out = Pose::identity(2);
    out.joints[0].translation = [1.0, 2.0, 3.0];
    node.evaluate(&mut ctx, 0.016, Some(1.5), &mut out);
    let data = node.unique_data(ctx.id).unwrap();
    assert_eq!(data.stage, TickStage::BindPose);
    assert!(data.blend_infos.is_empty());
    assert_eq!(out, ctx.rest_pose);
}

/// it should prefer the interactive position, then the input, then the range midpoint
#[test]
fn position_source_priority() {
    let (mut node, ctx) = abc();
    let data = node.update(&ctx, 0.0, None);
    approx(data.current_position, 1.0, 1e-6);
    assert!(data.has_error);

    let data = node.update(&ctx, 0.0, Some(0.25));
    approx(data.current_position, 0.25, 1e-6);
    assert!(!data.has_error);

    node.set_current_position(1.75);
    let data = node.update(&ctx, 0.0, Some(0.25));
    approx(data.current_position, 1.75, 1e-6);
    node.clear_current_position();
    assert_eq!(node.interactive_position(), None);
}

/// it should blend sampled poses by weight and keep rotations normalized
#[test]
fn output_pose_is_weighted_blend() {
    let yaw = |a: f32| [0.0, (a * 0.5).sin(), 0.0, (a * 0.5).cos()];
    let low = ClipMotion::new("low", 1.0).with_track(
        1,
        vec![TransformKey {
            time: 0.0,
            transform: Transform {
                translation: [0.0, 0.0, 0.0],
                rotation: yaw(0.0),
                scale: [1.0; 3],
            },
        }],
    );
    let high = ClipMotion::new("high", 1.0).with_track(
        1,
        vec![TransformKey {
            time: 0.0,
            transform: Transform {
                translation: [4.0, 0.0, 0.0],
                rotation: yaw(1.0),
                scale: [1.0; 3],
            },
        }],
    );
    let set = motion_set(vec![low, high]);
    let mut node = node(manual_config(&[("low", 0.0), ("high", 1.0)]));
    let mut ctx = context(ContextId(0), set);
    let mut out = Pose::default();
    node.evaluate(&mut ctx, 0.016, Some(0.25), &mut out);

    assert_eq!(out.joint_count(), 2);
    approx(out.joints[1].translation[0], 1.0, 1e-5);
    approx(out.joints[1].scale[0], 1.0, 1e-5);
    approx(norm4(out.joints[1].rotation), 1.0, 1e-5);
    assert_eq!(out.joints[0], Transform::IDENTITY);
    assert_eq!(ctx.pose_pool.in_use(), 0);
    assert_eq!(ctx.pose_pool.free_count(), 1);
}

/// it should strip root motion only when both the clip instance and the context extract it
#[test]
fn motion_extraction_compensation_requires_context_opt_in() {
    let set = motion_set(vec![
        ClipMotion::new("walk", 1.0).with_root_travel([0.0; 3], [0.0, 0.0, 4.0])
    ]);
    let mut node = node(manual_config(&[("walk", 0.0)]));
    let mut out = Pose::default();

    let mut plain = context(ContextId(0), set.clone());
    node.evaluate(&mut plain, 0.5, Some(0.0), &mut out);
    approx(out.joints[0].translation[2], 2.0, 1e-5);

    let mut extracting = context(ContextId(1), set).with_motion_extraction(true);
    node.evaluate(&mut extracting, 0.5, Some(0.0), &mut out);
    approx(out.joints[0].translation[2], 0.0, 1e-6);
}

/// it should publish the master's timing when syncing and the first motion's otherwise
#[test]
fn timing_is_copied_from_sync_master() {
    let set = motion_set(vec![posed_clip("a", 1.0, 0.0), posed_clip("b", 2.0, 1.0)]);
    let mut cfg = manual_config(&[("a", 0.0), ("b", 1.0)]);
    cfg.sync_mode = SyncMode::ClipBased;
    cfg.sync_master_motion_id = "b".into();
    let mut node = node(cfg);
    let ctx = context(ContextId(0), set);

    let data = node.update(&ctx, 0.5, Some(1.0));
    assert_eq!(data.master_motion_idx, 1);
    approx(data.timing.duration, 2.0, 1e-6);
    approx(data.timing.current_time, 0.5, 1e-5);
    approx(data.timing.play_speed, 1.0, 1e-6);
    // Follower tracks the master's phase.
    approx(data.motion_infos[0].current_time, 0.25, 1e-5);

    node.set_sync_mode(SyncMode::Disabled);
    let data = node.update(&ctx, 0.25, Some(1.0));
    approx(data.timing.duration, 1.0, 1e-6);
    approx(data.timing.current_time, 0.5, 1e-5);
}

/// it should rebuild caches after a configuration edit
#[test]
fn configuration_edits_trigger_rebuild() {
    let (mut node, ctx) = abc();
    node.update(&ctx, 0.0, Some(0.5));
    let before = node.revision();
    node.set_motion_coordinate("A", 5.0).expect("motion exists");
    assert!(node.revision() > before);

    let data = node.update(&ctx, 0.0, Some(0.5));
    assert_eq!(data.sorted_motions, vec![1, 2, 0]);
    assert_eq!(
        data.blend_infos,
        vec![BlendInfo {
            motion_index: 1,
            weight: 1.0
        }]
    );
    assert!(node.set_motion_coordinate("Z", 1.0).is_err());
}

/// it should keep per-context state independent
#[test]
fn contexts_do_not_share_state() {
    let set = motion_set(vec![posed_clip("A", 1.0, 0.0), posed_clip("B", 2.0, 1.0)]);
    let mut node = node(manual_config(&[("A", 0.0), ("B", 1.0)]));
    let mut ids = IdAllocator::new();
    let first = context(ids.alloc_context(), set.clone());
    let second = context(ids.alloc_context(), set);

    node.update(&first, 0.25, Some(0.0));
    node.update(&second, 0.75, Some(1.0));

    let a = node.unique_data(first.id).unwrap();
    let b = node.unique_data(second.id).unwrap();
    approx(a.motion_infos[0].current_time, 0.25, 1e-6);
    approx(b.motion_infos[0].current_time, 0.75, 1e-6);
    assert_eq!(a.blend_infos[0].motion_index, 0);
    assert_eq!(b.blend_infos[0].motion_index, 1);

    assert!(node.remove_context(first.id).is_some());
    assert!(node.unique_data(first.id).is_none());
    assert!(node.unique_data(second.id).is_some());
}

/// it should restart all motions on rewind
#[test]
fn rewind_resets_playback() {
    let (mut node, ctx) = abc();
    node.update(&ctx, 0.4, Some(0.5));
    node.rewind(&ctx);
    let data = node.unique_data(ctx.id).unwrap();
    for info in &data.motion_infos {
        approx(info.current_time, 0.0, 1e-6);
        approx(info.instance.current_time(), 0.0, 1e-6);
    }
}

/// it should compute and restore automatic coordinates
#[test]
fn compute_and_restore_motion_coordinates() {
    let set = motion_set(vec![
        ClipMotion::new("walk", 1.0).with_root_travel([0.0; 3], [0.0, 0.0, 1.5]),
        ClipMotion::new("run", 1.0).with_root_travel([0.0; 3], [0.0, 0.0, 4.0]),
    ]);
    let cfg = BlendSpace1DConfig {
        evaluator: Some("move_speed".into()),
        motions: vec![BlendSpaceMotion::at("walk", 9.0), BlendSpaceMotion::new("run")],
        ..Default::default()
    };
    let mut node = node(cfg);
    let ctx = context(ContextId(0), set);
    assert_eq!(node.axis_label(), "Move speed");

    let walk = node
        .compute_motion_coordinate("walk", &ctx)
        .unwrap()
        .expect("walk resolves");
    approx(walk, 1.5, 1e-4);

    node.restore_motion_coordinate("walk", &ctx).unwrap();
    let entry = &node.config().motions[0];
    assert!(!entry.x_set_by_user);
    approx(entry.x, 1.5, 1e-4);

    let data = node.update(&ctx, 0.0, Some(1.5));
    approx(data.motion_coordinates[0], 1.5, 1e-4);
    approx(data.motion_coordinates[1], 4.0, 1e-4);

    assert!(node.set_evaluator(Some("unknown")).is_err());
    assert_eq!(node.axis_label(), "Move speed");

    node.set_calculation_method(CalculationMethod::Manual).unwrap();
    assert_eq!(node.axis_label(), "X-Axis");
    assert_eq!(node.compute_motion_coordinate("run", &ctx).unwrap(), Some(0.0));
}
