//! Motion import contract and the crate's own stored-skeleton JSON format.
//!
//! An importer produces a [`Hierarchy`] plus a fully populated
//! [`HierarchyPoseGroup`]. Formats other than the stored-skeleton JSON
//! implement [`MotionImporter`] outside this crate.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use nalgebra::Vector3;
use serde::Deserialize;
use tracing::debug;

use crate::error::SkeletonError;
use crate::hierarchy::Hierarchy;
use crate::pose::NodePose;
use crate::pose_group::HierarchyPoseGroup;

/// Result of a successful import.
#[derive(Debug)]
pub struct ImportedMotion {
    pub name: String,
    pub hierarchy: Arc<Hierarchy>,
    pub poses: HierarchyPoseGroup,
}

impl ImportedMotion {
    #[inline]
    pub fn pose_count(&self) -> usize {
        self.poses.pose_count()
    }

    /// Publish the pose group for sharing between hierarchy states.
    pub fn into_shared(self) -> (Arc<Hierarchy>, Arc<HierarchyPoseGroup>) {
        (self.hierarchy, Arc::new(self.poses))
    }
}

pub trait MotionImporter {
    fn import(&self, path: &Path) -> Result<ImportedMotion, SkeletonError>;
}

/// Reads stored-skeleton JSON files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredSkeletonImporter;

impl MotionImporter for StoredSkeletonImporter {
    fn import(&self, path: &Path) -> Result<ImportedMotion, SkeletonError> {
        let text = fs::read_to_string(path)?;
        let motion = parse_stored_skeleton_json(&text)?;
        debug!(
            path = %path.display(),
            poses = motion.pose_count(),
            nodes = motion.hierarchy.node_count(),
            "stored skeleton imported"
        );
        Ok(motion)
    }
}

/// Parse a stored skeleton:
///
/// ```json
/// { "name": "arm",
///   "nodes": [{ "name": "root" }, { "name": "upper", "parent": "root" }],
///   "poses": [[{}, { "translation": [1, 0, 0], "rotation": [0, 0, 1.57] }]] }
/// ```
///
/// Parents are referenced by name and must appear earlier in `nodes`.
/// Missing channels default to identity; rotations are Euler radians.
pub fn parse_stored_skeleton_json(s: &str) -> Result<ImportedMotion, SkeletonError> {
    let stored: StoredSkeleton = serde_json::from_str(s)?;

    let hierarchy = stored
        .nodes
        .iter()
        .fold(Hierarchy::builder(), |b, n| b.node(&n.name, n.parent.as_deref()))
        .build()?;
    let hierarchy = Arc::new(hierarchy);
    let node_count = hierarchy.node_count();

    if stored.poses.is_empty() {
        return Err(SkeletonError::invalid("stored skeleton has no poses"));
    }
    let mut poses = HierarchyPoseGroup::new(Arc::clone(&hierarchy), stored.poses.len())?;
    for (index, stored_pose) in stored.poses.iter().enumerate() {
        if stored_pose.len() != node_count {
            return Err(SkeletonError::invalid(format!(
                "pose {index} has {} node poses, hierarchy has {node_count} nodes",
                stored_pose.len()
            )));
        }
        let pose = poses.pose_mut(index)?;
        for (out, node) in pose.iter_mut().zip(stored_pose) {
            *out = node.to_node_pose();
        }
    }

    Ok(ImportedMotion {
        name: stored.name,
        hierarchy,
        poses,
    })
}

#[derive(Debug, Deserialize)]
struct StoredSkeleton {
    #[serde(default)]
    name: String,
    nodes: Vec<StoredNode>,
    #[serde(default)]
    poses: Vec<Vec<StoredNodePose>>,
}

#[derive(Debug, Deserialize)]
struct StoredNode {
    name: String,
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoredNodePose {
    #[serde(default)]
    translation: Option<[f32; 3]>,
    #[serde(default)]
    rotation: Option<[f32; 3]>,
    #[serde(default)]
    scale: Option<[f32; 3]>,
}

impl StoredNodePose {
    fn to_node_pose(&self) -> NodePose {
        let identity = NodePose::identity();
        NodePose {
            translation: self.translation.map_or(identity.translation, Vector3::from),
            rotation: self.rotation.map_or(identity.rotation, Vector3::from),
            scale: self.scale.map_or(identity.scale, Vector3::from),
        }
    }
}
