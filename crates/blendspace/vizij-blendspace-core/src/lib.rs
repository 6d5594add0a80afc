//! Vizij Blend Space Core (engine-agnostic)
//!
//! One-dimensional blend space evaluation: motions are placed at scalar
//! coordinates along an axis, a query position selects the bracketing pair,
//! and the pair is synchronized and blended into an output pose each tick.
//!
//! Clips, motion sets, and poses are collaborator contracts ([`Motion`],
//! [`MotionSet`], [`Pose`]); [`ClipMotion`] and [`InMemoryMotionSet`] are
//! data-driven implementations usable by adapters and tests.

pub mod clip;
pub mod compositor;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod ids;
pub mod motion;
pub mod node;
pub mod organizer;
pub mod pose;
pub mod segment;
pub mod sync;
pub mod unique_data;

// Re-exports for consumers (adapters)
pub use clip::{ClipMotion, InMemoryMotionSet, JointTrack, TransformKey};
pub use config::{BlendSpace1DConfig, BlendSpaceMotion, CalculationMethod, SyncMode};
pub use error::BlendSpaceError;
pub use evaluator::{CoordinateEvaluator, EvaluatorRegistry, ParamEvaluator};
pub use ids::{ContextId, IdAllocator};
pub use motion::{Motion, MotionExtractionFlags, MotionInfo, MotionInstance, MotionSet, SyncTrack};
pub use node::{AnimContext, BlendSpace1DNode};
pub use pose::{Pose, PosePool, Transform};
pub use segment::{BlendInfo, Segment};
pub use sync::{DefaultSynchronizer, PlaybackSynchronizer, PlaybackTiming};
pub use unique_data::{TickStage, UniqueData};
