//! Key pose library: every pose of one hierarchy in a single slab.
//!
//! All node-poses live in one boxed slice of `node_count * pose_count`
//! entries. Pose `i` is the range `i * node_count .. (i + 1) * node_count`,
//! so there is exactly one allocation to create and one to release.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::error::SkeletonError;
use crate::hierarchy::Hierarchy;
use crate::pose::{HierarchyPose, NodePose};

#[derive(Debug, Default)]
pub struct HierarchyPoseGroup {
    hierarchy: Option<Arc<Hierarchy>>,
    node_poses: Box<[NodePose]>,
    pose_count: usize,
}

impl HierarchyPoseGroup {
    /// Create and initialize in one step.
    pub fn new(hierarchy: Arc<Hierarchy>, pose_count: usize) -> Result<Self, SkeletonError> {
        let mut group = Self::default();
        group.create(hierarchy, pose_count)?;
        Ok(group)
    }

    /// Allocate `pose_count` identity poses for `hierarchy`. Returns the pose count.
    pub fn create(
        &mut self,
        hierarchy: Arc<Hierarchy>,
        pose_count: usize,
    ) -> Result<usize, SkeletonError> {
        if self.is_initialized() {
            return Err(SkeletonError::AlreadyInitialized { what: "pose group" });
        }
        if pose_count == 0 {
            return Err(SkeletonError::invalid("pose count must be greater than 0"));
        }
        let node_count = hierarchy.node_count();
        if node_count == 0 {
            return Err(SkeletonError::NotInitialized { what: "hierarchy" });
        }
        let total = node_count.checked_mul(pose_count).ok_or_else(|| {
            SkeletonError::invalid(format!(
                "pose group of {pose_count} poses x {node_count} nodes is too large"
            ))
        })?;

        self.node_poses = vec![NodePose::identity(); total].into_boxed_slice();
        self.pose_count = pose_count;
        self.hierarchy = Some(hierarchy);
        debug!(pose_count, node_count, "pose group created");
        Ok(pose_count)
    }

    /// Free the slab and return to the uninitialized state.
    pub fn release(&mut self) -> Result<usize, SkeletonError> {
        if !self.is_initialized() {
            return Err(SkeletonError::NotInitialized { what: "pose group" });
        }
        let released = self.pose_count;
        *self = Self::default();
        debug!(pose_count = released, "pose group released");
        Ok(released)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.hierarchy.is_some()
    }

    #[inline]
    pub fn hierarchy(&self) -> Option<&Arc<Hierarchy>> {
        self.hierarchy.as_ref()
    }

    #[inline]
    pub fn pose_count(&self) -> usize {
        self.pose_count
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.hierarchy.as_ref().map_or(0, |h| h.node_count())
    }

    /// The whole slab, pose after pose.
    #[inline]
    pub fn node_poses(&self) -> &[NodePose] {
        &self.node_poses
    }

    pub fn pose(&self, index: usize) -> Result<HierarchyPose<'_>, SkeletonError> {
        let range = self.pose_range(index)?;
        Ok(HierarchyPose::new(&self.node_poses[range]))
    }

    /// Mutable pose access. Only reachable while the group is exclusively
    /// owned, i.e. before it is shared with hierarchy states.
    pub fn pose_mut(&mut self, index: usize) -> Result<&mut [NodePose], SkeletonError> {
        let range = self.pose_range(index)?;
        Ok(&mut self.node_poses[range])
    }

    pub fn node_pose(&self, pose: usize, node: usize) -> Result<&NodePose, SkeletonError> {
        let node_count = self.node_count();
        if node >= node_count {
            return Err(SkeletonError::IndexOutOfRange {
                what: "node",
                index: node,
                count: node_count,
            });
        }
        let range = self.pose_range(pose)?;
        Ok(&self.node_poses[range.start + node])
    }

    /// Iterate all poses in order.
    pub fn poses(&self) -> impl Iterator<Item = HierarchyPose<'_>> {
        let n = self.node_count().max(1);
        self.node_poses.chunks_exact(n).map(HierarchyPose::new)
    }

    fn pose_range(&self, index: usize) -> Result<Range<usize>, SkeletonError> {
        if !self.is_initialized() {
            return Err(SkeletonError::NotInitialized { what: "pose group" });
        }
        if index >= self.pose_count {
            return Err(SkeletonError::IndexOutOfRange {
                what: "pose",
                index,
                count: self.pose_count,
            });
        }
        let n = self.node_count();
        Ok(index * n..(index + 1) * n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Arc<Hierarchy> {
        Arc::new(Hierarchy::new(vec![("root", None), ("a", Some(0)), ("b", Some(1))]).unwrap())
    }

    #[test]
    fn poses_are_contiguous_slices_of_one_slab() {
        let group = HierarchyPoseGroup::new(chain(), 4).unwrap();
        assert_eq!(group.node_poses().len(), 12);
        let base = group.node_poses().as_ptr();
        let third = group.pose(2).unwrap().node_poses().as_ptr();
        // pose 2 starts 6 node-poses into the slab
        assert_eq!(third, base.wrapping_add(6));
        assert_eq!(group.poses().count(), 4);
    }

    #[test]
    fn node_pose_bounds() {
        let group = HierarchyPoseGroup::new(chain(), 2).unwrap();
        assert!(group.node_pose(1, 2).is_ok());
        assert!(matches!(
            group.node_pose(1, 3),
            Err(SkeletonError::IndexOutOfRange { what: "node", .. })
        ));
        assert!(matches!(
            group.node_pose(2, 0),
            Err(SkeletonError::IndexOutOfRange { what: "pose", .. })
        ));
    }
}
