use thiserror::Error;

/// Errors surfaced by blend space configuration and rebuilds.
///
/// Per-tick problems (unresolved motions, empty motion lists) are not errors;
/// they degrade the output and raise [`crate::UniqueData::has_error`] instead.
#[derive(Debug, Error)]
pub enum BlendSpaceError {
    #[error("evaluation context has no motion set")]
    MissingMotionSet,
    #[error("unknown parameter evaluator '{0}'")]
    UnknownEvaluator(String),
    #[error("no blend space motion with id '{0}'")]
    UnknownMotion(String),
    #[error("blend space config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid clip: {0}")]
    InvalidClip(String),
}
