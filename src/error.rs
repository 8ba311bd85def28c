use thiserror::Error;

/// Precondition violations in the decomposition pipeline.
///
/// None of these are transient. Each carries the values that were rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EpicycleError {
    #[error("invalid trajectory of {len} points: {reason}")]
    InvalidTrajectory { len: usize, reason: String },

    #[error("circle count {circles} must be between 1 and sample count {samples}")]
    InvalidTruncation { circles: usize, samples: usize },

    #[error("trajectory source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
}

pub type Result<T, E = EpicycleError> = std::result::Result<T, E>;
