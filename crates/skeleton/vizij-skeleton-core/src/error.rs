//! Error types for skeleton storage, kinematics and clip playback

use serde::Serialize;

/// Error type shared by every operation in the crate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub enum SkeletonError {
    /// An argument was missing, empty or otherwise unusable
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Operation requires an initialized object
    #[error("{what} is not initialized")]
    NotInitialized { what: &'static str },

    /// Create was called on an object that already holds data
    #[error("{what} is already initialized")]
    AlreadyInitialized { what: &'static str },

    /// Index outside of a pool or hierarchy
    #[error("{what} index {index} is out of range (count {count})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },

    /// Keyframe range that does not fit its pool
    #[error("Invalid keyframe range [{first}, {last}] for pool of {count}")]
    InvalidRange {
        first: usize,
        last: usize,
        count: usize,
    },

    /// Name lookup miss
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// Zero or near-zero durations that would stall playback
    #[error("Degenerate timing: {reason}")]
    DegenerateTiming { reason: String },

    /// The crossing loop of a single update hit its guard
    #[error("Boundary crossing limit of {limit} exceeded in a single update")]
    CrossingLimitExceeded { limit: usize },

    /// Negative or non-finite time value
    #[error("Invalid time value: {time}")]
    InvalidTime { time: f64 },

    /// Hierarchy violates parent-before-child ordering or is empty
    #[error("Invalid hierarchy: {reason}")]
    InvalidHierarchy { reason: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    /// IO error
    #[error("IO error: {reason}")]
    Io { reason: String },
}

impl SkeletonError {
    /// Shorthand for [`SkeletonError::InvalidArgument`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Timing failures can be fixed by editing durations and retrying.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DegenerateTiming { .. } | Self::CrossingLimitExceeded { .. } | Self::InvalidTime { .. }
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "argument",
            Self::NotInitialized { .. } | Self::AlreadyInitialized { .. } => "lifecycle",
            Self::IndexOutOfRange { .. } | Self::InvalidRange { .. } => "range",
            Self::NotFound { .. } => "lookup",
            Self::DegenerateTiming { .. }
            | Self::CrossingLimitExceeded { .. }
            | Self::InvalidTime { .. } => "timing",
            Self::InvalidHierarchy { .. } | Self::Serialization { .. } | Self::Io { .. } => {
                "import"
            }
        }
    }
}

impl From<std::io::Error> for SkeletonError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SkeletonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Converts count-returning results into the signed status form
/// (count on success, `-1` on failure) used by C-style callers.
pub trait StatusCode {
    fn status(&self) -> i32;
}

impl StatusCode for crate::Result<usize> {
    fn status(&self) -> i32 {
        match self {
            Ok(count) => i32::try_from(*count).unwrap_or(i32::MAX),
            Err(_) => -1,
        }
    }
}

impl StatusCode for Option<usize> {
    fn status(&self) -> i32 {
        match self {
            Some(index) => i32::try_from(*index).unwrap_or(i32::MAX),
            None => -1,
        }
    }
}
