//! Vizij Skeleton Core (engine-agnostic)
//!
//! Skeletal animation runtime: key pose storage for a node hierarchy,
//! per-instance transform buffers, forward kinematics, and keyframe/clip
//! playback with stop, loop and ping-pong boundary handling. Renderers read
//! the finished matrix buffers of a [`HierarchyState`] once per frame.

pub mod clip;
pub mod config;
pub mod controller;
pub mod error;
pub mod hierarchy;
pub mod importer;
pub mod keyframe;
pub mod kinematics;
pub mod names;
pub mod pose;
pub mod pose_group;
pub mod rig;
pub mod state;

// Re-exports for consumers (adapters)
pub use clip::{Clip, ClipPool};
pub use config::Config;
pub use controller::{BoundaryAction, ClipController, PlayDirection};
pub use error::{SkeletonError, StatusCode};
pub use hierarchy::{Hierarchy, HierarchyBuilder, HierarchyNode};
pub use importer::{parse_stored_skeleton_json, ImportedMotion, MotionImporter, StoredSkeletonImporter};
pub use keyframe::{Keyframe, KeyframePool, SampleRef};
pub use kinematics::{
    convert_local_pose, pose_convert, pose_convert_per_node, solve_forward, solve_forward_partial,
    update_object_bind_to_current, update_object_bind_to_current_self,
};
pub use names::NAME_LEN_MAX;
pub use pose::{pose_copy, pose_lerp, pose_reset, HierarchyPose, HierarchyPoseFlags, NodePose, PoseChannels};
pub use pose_group::HierarchyPoseGroup;
pub use rig::{Rig, SampleAsPoseIndex, SampleResolver};
pub use state::HierarchyState;

pub type Result<T> = core::result::Result<T, SkeletonError>;
