//! Per-instance runtime buffers for one animated skeleton.
//!
//! A state owns the working pose plus four matrix arrays of `node_count`
//! entries each. The matrices share one boxed slice and are addressed as
//! consecutive ranges: local, object, object-inverse, bind-to-current.

use std::sync::Arc;

use nalgebra::Matrix4;
use tracing::debug;

use crate::error::SkeletonError;
use crate::hierarchy::Hierarchy;
use crate::pose::{pose_copy, pose_lerp, pose_reset, NodePose};
use crate::pose_group::HierarchyPoseGroup;

const MATRIX_ARRAYS: usize = 4;

#[derive(Debug, Default)]
pub struct HierarchyState {
    pose_group: Option<Arc<HierarchyPoseGroup>>,
    local_pose: Box<[NodePose]>,
    transforms: Box<[Matrix4<f32>]>,
}

/// Split mutable view of a state's buffers.
pub(crate) struct StateBuffers<'a> {
    pub hierarchy: &'a Hierarchy,
    pub local_pose: &'a [NodePose],
    pub local_space: &'a mut [Matrix4<f32>],
    pub object_space: &'a mut [Matrix4<f32>],
    pub object_space_inverse: &'a mut [Matrix4<f32>],
    pub bind_to_current: &'a mut [Matrix4<f32>],
}

impl HierarchyState {
    pub fn new(pose_group: Arc<HierarchyPoseGroup>) -> Result<Self, SkeletonError> {
        let mut state = Self::default();
        state.create(pose_group)?;
        Ok(state)
    }

    /// Bind to a pose group and allocate buffers. Returns the node count.
    pub fn create(&mut self, pose_group: Arc<HierarchyPoseGroup>) -> Result<usize, SkeletonError> {
        if self.is_initialized() {
            return Err(SkeletonError::AlreadyInitialized {
                what: "hierarchy state",
            });
        }
        if !pose_group.is_initialized() {
            return Err(SkeletonError::NotInitialized { what: "pose group" });
        }
        let count = pose_group.node_count();

        self.local_pose = vec![NodePose::identity(); count].into_boxed_slice();
        self.transforms = vec![Matrix4::identity(); count * MATRIX_ARRAYS].into_boxed_slice();
        self.pose_group = Some(pose_group);
        debug!(node_count = count, "hierarchy state created");
        Ok(count)
    }

    pub fn release(&mut self) -> Result<usize, SkeletonError> {
        if !self.is_initialized() {
            return Err(SkeletonError::NotInitialized {
                what: "hierarchy state",
            });
        }
        let count = self.node_count();
        *self = Self::default();
        debug!(node_count = count, "hierarchy state released");
        Ok(count)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.pose_group.is_some()
    }

    #[inline]
    pub fn pose_group(&self) -> Option<&Arc<HierarchyPoseGroup>> {
        self.pose_group.as_ref()
    }

    pub fn hierarchy(&self) -> Option<&Arc<Hierarchy>> {
        self.pose_group.as_ref().and_then(|g| g.hierarchy())
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.local_pose.len()
    }

    #[inline]
    pub fn local_pose(&self) -> &[NodePose] {
        &self.local_pose
    }

    #[inline]
    pub fn local_pose_mut(&mut self) -> &mut [NodePose] {
        &mut self.local_pose
    }

    #[inline]
    pub fn local_space(&self) -> &[Matrix4<f32>] {
        self.matrices(0)
    }

    #[inline]
    pub fn object_space(&self) -> &[Matrix4<f32>] {
        self.matrices(1)
    }

    #[inline]
    pub fn object_space_inverse(&self) -> &[Matrix4<f32>] {
        self.matrices(2)
    }

    #[inline]
    pub fn object_space_bind_to_current(&self) -> &[Matrix4<f32>] {
        self.matrices(3)
    }

    fn matrices(&self, slot: usize) -> &[Matrix4<f32>] {
        let n = self.node_count();
        &self.transforms[slot * n..(slot + 1) * n]
    }

    pub(crate) fn buffers_mut(&mut self) -> Result<StateBuffers<'_>, SkeletonError> {
        let n = self.local_pose.len();
        let hierarchy = self
            .pose_group
            .as_ref()
            .and_then(|g| g.hierarchy())
            .map(Arc::as_ref)
            .ok_or(SkeletonError::NotInitialized {
                what: "hierarchy state",
            })?;
        let (local_space, rest) = self.transforms.split_at_mut(n);
        let (object_space, rest) = rest.split_at_mut(n);
        let (object_space_inverse, bind_to_current) = rest.split_at_mut(n);
        Ok(StateBuffers {
            hierarchy,
            local_pose: &self.local_pose,
            local_space,
            object_space,
            object_space_inverse,
            bind_to_current,
        })
    }

    /// Reset the working pose to identity.
    pub fn reset_pose(&mut self) -> usize {
        pose_reset(&mut self.local_pose)
    }

    /// Copy key pose `index` of the bound group into the working pose.
    pub fn load_pose(&mut self, index: usize) -> Result<usize, SkeletonError> {
        let group = self.pose_group.as_ref().ok_or(SkeletonError::NotInitialized {
            what: "hierarchy state",
        })?;
        let pose = group.pose(index)?;
        pose_copy(&mut self.local_pose, pose.node_poses())
    }

    /// Blend key poses `a` and `b` of the bound group into the working pose.
    pub fn blend_poses(&mut self, a: usize, b: usize, t: f32) -> Result<usize, SkeletonError> {
        let group = self.pose_group.as_ref().ok_or(SkeletonError::NotInitialized {
            what: "hierarchy state",
        })?;
        let pa = group.pose(a)?;
        let pb = group.pose(b)?;
        pose_lerp(&mut self.local_pose, pa.node_poses(), pb.node_poses(), t)
    }

    /// Recompute object-space inverses. Fails without writing anything if a
    /// matrix is singular.
    pub fn update_object_inverse(&mut self) -> Result<usize, SkeletonError> {
        let buffers = self.buffers_mut()?;
        let inverses = buffers
            .object_space
            .iter()
            .enumerate()
            .map(|(i, m)| {
                m.try_inverse().ok_or_else(|| {
                    SkeletonError::invalid(format!("object-space matrix of node {i} is singular"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        buffers.object_space_inverse.copy_from_slice(&inverses);
        Ok(inverses.len())
    }

    /// Snapshot the current object-space inverses, typically right after
    /// solving the bind pose.
    pub fn capture_bind_inverse(&self) -> Vec<Matrix4<f32>> {
        self.object_space_inverse().to_vec()
    }
}
