//! Core configuration for vizij-skeleton-core.

use serde::{Deserialize, Serialize};

use crate::error::SkeletonError;
use crate::pose::PoseChannels;

/// Tuning knobs shared by clip playback and the rig pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Durations at or below this value count as zero.
    pub duration_epsilon: f32,
    /// Upper bound on keyframe/clip boundary crossings resolved by one update.
    pub max_boundary_crossings: usize,
    /// Channels converted from the working pose into local matrices.
    #[serde(default = "default_pose_channels")]
    pub pose_channels: PoseChannels,
}

fn default_pose_channels() -> PoseChannels {
    PoseChannels::ROTATE | PoseChannels::TRANSLATE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration_epsilon: 1e-6,
            max_boundary_crossings: 4096,
            pose_channels: default_pose_channels(),
        }
    }
}

impl Config {
    /// Tighter guard for tools that want runaway playback to fail fast.
    pub fn strict() -> Self {
        Self {
            duration_epsilon: 1e-4,
            max_boundary_crossings: 256,
            pose_channels: PoseChannels::ALL,
        }
    }

    /// Parse a configuration from JSON, validating the result.
    pub fn from_json(s: &str) -> Result<Self, SkeletonError> {
        let cfg: Config = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SkeletonError> {
        if !self.duration_epsilon.is_finite() || self.duration_epsilon < 0.0 {
            return Err(SkeletonError::invalid(
                "Duration epsilon must be finite and non-negative",
            ));
        }
        if self.max_boundary_crossings == 0 {
            return Err(SkeletonError::invalid(
                "Maximum boundary crossings must be greater than 0",
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn with_duration_epsilon(mut self, epsilon: f32) -> Self {
        self.duration_epsilon = epsilon;
        self
    }

    #[inline]
    pub fn with_max_boundary_crossings(mut self, limit: usize) -> Self {
        self.max_boundary_crossings = limit;
        self
    }

    #[inline]
    pub fn with_pose_channels(mut self, channels: PoseChannels) -> Self {
        self.pose_channels = channels;
        self
    }
}
