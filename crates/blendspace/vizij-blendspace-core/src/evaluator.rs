//! Motion coordinate evaluation.
//!
//! A motion's coordinate is either placed by the user or measured from the
//! clip by a [`ParamEvaluator`] (speed, distance, turning...). The choice is
//! resolved once per configuration into a [`CoordinateEvaluator`].

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::config::{BlendSpace1DConfig, BlendSpaceMotion, CalculationMethod};
use crate::error::BlendSpaceError;
use crate::motion::MotionInstance;
use crate::pose::yaw_angle;

/// Registry name meaning "no automatic evaluator".
pub const NULL_EVALUATOR: &str = "none";

/// Axis label used when no evaluator names the axis.
pub const DEFAULT_AXIS_LABEL: &str = "X-Axis";

/// Number of root samples taken across a clip by the built-in evaluators.
const ROOT_SAMPLES: usize = 32;

/// Measures a scalar property of a clip.
pub trait ParamEvaluator: fmt::Debug + Send + Sync {
    /// Registry key (snake_case), as written in configuration.
    fn key(&self) -> &str;
    /// Human readable axis label.
    fn label(&self) -> &str;
    /// Compute the coordinate of a sampling-ready instance. Must not change
    /// the instance's playback state.
    fn compute_param_value(&self, instance: &MotionInstance) -> f32;
}

/// Resolved placement strategy for motions without a user coordinate.
#[derive(Clone, Debug, Default)]
pub enum CoordinateEvaluator {
    /// No automatic placement; unset coordinates are 0.0.
    #[default]
    Manual,
    Automatic(Arc<dyn ParamEvaluator>),
}

impl CoordinateEvaluator {
    /// Resolve the evaluator a configuration asks for.
    pub fn from_config(
        config: &BlendSpace1DConfig,
        registry: &EvaluatorRegistry,
    ) -> Result<Self, BlendSpaceError> {
        match (config.calculation_method, config.evaluator.as_deref()) {
            (CalculationMethod::Manual, _) => Ok(Self::Manual),
            (CalculationMethod::Auto, None) | (CalculationMethod::Auto, Some(NULL_EVALUATOR)) => {
                Ok(Self::Manual)
            }
            (CalculationMethod::Auto, Some(key)) => registry
                .find(key)
                .map(Self::Automatic)
                .ok_or_else(|| BlendSpaceError::UnknownEvaluator(key.to_string())),
        }
    }

    pub fn axis_label(&self) -> &str {
        match self {
            Self::Manual => DEFAULT_AXIS_LABEL,
            Self::Automatic(evaluator) => evaluator.label(),
        }
    }

    /// Evaluator value for `instance`, or `None` in manual mode.
    pub fn evaluate(&self, instance: &MotionInstance) -> Option<f32> {
        match self {
            Self::Manual => None,
            Self::Automatic(evaluator) => Some(evaluator.compute_param_value(instance)),
        }
    }

    /// Coordinate for one configured motion: the user value wins, then the
    /// evaluator, then 0.0.
    pub fn coordinate_for(&self, entry: &BlendSpaceMotion, instance: &MotionInstance) -> f32 {
        if entry.x_set_by_user {
            return entry.x;
        }
        self.evaluate(instance).unwrap_or(0.0)
    }
}

/// Named parameter evaluators.
#[derive(Debug, Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<String, Arc<dyn ParamEvaluator>>,
}

impl EvaluatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in evaluator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MoveSpeed));
        registry.register(Arc::new(TravelDistance));
        registry.register(Arc::new(TurnSpeed));
        registry.register(Arc::new(TravelDirection));
        registry.register(Arc::new(TravelSlope));
        registry
    }

    pub fn register(&mut self, evaluator: Arc<dyn ParamEvaluator>) {
        self.evaluators.insert(evaluator.key().to_string(), evaluator);
    }

    pub fn find(&self, key: &str) -> Option<Arc<dyn ParamEvaluator>> {
        self.evaluators.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.evaluators.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Root translations sampled uniformly over the clip, first and last included.
fn root_path(instance: &MotionInstance) -> Vec<[f32; 3]> {
    let motion = instance.motion();
    let duration = motion.duration();
    (0..=ROOT_SAMPLES)
        .map(|i| {
            let t = duration * i as f32 / ROOT_SAMPLES as f32;
            motion.sample_root(t).translation
        })
        .collect()
}

fn displacement(instance: &MotionInstance) -> [f32; 3] {
    let motion = instance.motion();
    let start = motion.sample_root(0.0).translation;
    let end = motion.sample_root(motion.duration()).translation;
    [end[0] - start[0], end[1] - start[1], end[2] - start[2]]
}

#[inline]
fn length3(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Wrap an angle delta into (-PI, PI].
fn wrap_angle(mut a: f32) -> f32 {
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Root path length divided by clip duration (units per second).
#[derive(Debug, Default)]
pub struct MoveSpeed;

impl ParamEvaluator for MoveSpeed {
    fn key(&self) -> &str {
        "move_speed"
    }

    fn label(&self) -> &str {
        "Move speed"
    }

    fn compute_param_value(&self, instance: &MotionInstance) -> f32 {
        let duration = instance.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        let path = root_path(instance);
        let distance: f32 = path
            .windows(2)
            .map(|w| length3([w[1][0] - w[0][0], w[1][1] - w[0][1], w[1][2] - w[0][2]]))
            .sum();
        distance / duration
    }
}

/// Straight-line root displacement from clip start to clip end.
#[derive(Debug, Default)]
pub struct TravelDistance;

impl ParamEvaluator for TravelDistance {
    fn key(&self) -> &str {
        "travel_distance"
    }

    fn label(&self) -> &str {
        "Travel distance"
    }

    fn compute_param_value(&self, instance: &MotionInstance) -> f32 {
        length3(displacement(instance))
    }
}

/// Signed root heading change per second (radians, counter-clockwise positive).
#[derive(Debug, Default)]
pub struct TurnSpeed;

impl ParamEvaluator for TurnSpeed {
    fn key(&self) -> &str {
        "turn_speed"
    }

    fn label(&self) -> &str {
        "Turn speed"
    }

    fn compute_param_value(&self, instance: &MotionInstance) -> f32 {
        let motion = instance.motion();
        let duration = motion.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        let mut total = 0.0;
        let mut prev = yaw_angle(motion.sample_root(0.0).rotation);
        for i in 1..=ROOT_SAMPLES {
            let t = duration * i as f32 / ROOT_SAMPLES as f32;
            let yaw = yaw_angle(motion.sample_root(t).rotation);
            total += wrap_angle(yaw - prev);
            prev = yaw;
        }
        total / duration
    }
}

/// Heading of the planar root displacement (radians, 0 along +Z, positive toward +X).
#[derive(Debug, Default)]
pub struct TravelDirection;

impl ParamEvaluator for TravelDirection {
    fn key(&self) -> &str {
        "travel_direction"
    }

    fn label(&self) -> &str {
        "Travel direction"
    }

    fn compute_param_value(&self, instance: &MotionInstance) -> f32 {
        let d = displacement(instance);
        if d[0] == 0.0 && d[2] == 0.0 {
            return 0.0;
        }
        d[0].atan2(d[2])
    }
}

/// Incline of the root displacement (radians, positive uphill).
#[derive(Debug, Default)]
pub struct TravelSlope;

impl ParamEvaluator for TravelSlope {
    fn key(&self) -> &str {
        "travel_slope"
    }

    fn label(&self) -> &str {
        "Travel slope"
    }

    fn compute_param_value(&self, instance: &MotionInstance) -> f32 {
        let d = displacement(instance);
        let planar = (d[0] * d[0] + d[2] * d[2]).sqrt();
        if planar == 0.0 && d[1] == 0.0 {
            return 0.0;
        }
        d[1].atan2(planar)
    }
}
