//! Per-node pose descriptors and whole-skeleton pose helpers.

use bitflags::bitflags;
use nalgebra::{Matrix4, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::SkeletonError;

bitflags! {
    /// Channels of a [`NodePose`] that take part in an operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PoseChannels: u8 {
        const TRANSLATE = 0b001;
        const ROTATE    = 0b010;
        const SCALE     = 0b100;
        const ALL = Self::TRANSLATE.bits() | Self::ROTATE.bits() | Self::SCALE.bits();
    }
}

impl Default for PoseChannels {
    fn default() -> Self {
        Self::ALL
    }
}

/// Local transform descriptor for one node.
///
/// `rotation` holds Euler angles in radians, applied about X, then Y, then Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePose {
    pub translation: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for NodePose {
    fn default() -> Self {
        Self::identity()
    }
}

impl NodePose {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: Vector3::repeat(1.0),
        }
    }

    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    pub fn from_rotation(rotation: Vector3<f32>) -> Self {
        Self {
            rotation,
            ..Self::identity()
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    /// Build the local matrix `T * R * S`, skipping unselected channels.
    pub fn to_matrix(&self, channels: PoseChannels) -> Matrix4<f32> {
        let mut m = Matrix4::identity();
        if channels.contains(PoseChannels::TRANSLATE) {
            m = Translation3::from(self.translation).to_homogeneous();
        }
        if channels.contains(PoseChannels::ROTATE) {
            let r = Rotation3::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z);
            m *= r.to_homogeneous();
        }
        if channels.contains(PoseChannels::SCALE) {
            m *= Matrix4::new_nonuniform_scaling(&self.scale);
        }
        m
    }

    /// Component-wise blend; `t = 0` yields `a`, `t = 1` yields `b`.
    pub fn lerp(a: &NodePose, b: &NodePose, t: f32) -> NodePose {
        NodePose {
            translation: a.translation.lerp(&b.translation, t),
            rotation: a.rotation.lerp(&b.rotation, t),
            scale: a.scale.lerp(&b.scale, t),
        }
    }
}

/// Borrowed view of one complete pose (one node-pose per hierarchy node).
#[derive(Debug, Clone, Copy)]
pub struct HierarchyPose<'a> {
    node_poses: &'a [NodePose],
}

impl<'a> HierarchyPose<'a> {
    pub(crate) fn new(node_poses: &'a [NodePose]) -> Self {
        Self { node_poses }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_poses.len()
    }

    #[inline]
    pub fn node_poses(&self) -> &'a [NodePose] {
        self.node_poses
    }

    #[inline]
    pub fn node(&self, index: usize) -> Option<&'a NodePose> {
        self.node_poses.get(index)
    }
}

/// Per-node channel flags, one entry per hierarchy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyPoseFlags {
    flags: Vec<PoseChannels>,
}

impl HierarchyPoseFlags {
    pub fn new(node_count: usize, channels: PoseChannels) -> Self {
        Self {
            flags: vec![channels; node_count],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[PoseChannels] {
        &self.flags
    }

    pub fn set(&mut self, node: usize, channels: PoseChannels) -> Result<(), SkeletonError> {
        let count = self.flags.len();
        let slot = self
            .flags
            .get_mut(node)
            .ok_or(SkeletonError::IndexOutOfRange {
                what: "node",
                index: node,
                count,
            })?;
        *slot = channels;
        Ok(())
    }

    #[inline]
    pub fn get(&self, node: usize) -> Option<PoseChannels> {
        self.flags.get(node).copied()
    }
}

/// Reset every node-pose to identity. Returns the node count.
pub fn pose_reset(pose: &mut [NodePose]) -> usize {
    pose.iter_mut().for_each(NodePose::reset);
    pose.len()
}

/// Copy `src` into `dst`; both must cover the same node count.
pub fn pose_copy(dst: &mut [NodePose], src: &[NodePose]) -> Result<usize, SkeletonError> {
    check_len(dst.len(), src.len())?;
    dst.copy_from_slice(src);
    Ok(dst.len())
}

/// Blend two poses node by node into `dst`.
pub fn pose_lerp(
    dst: &mut [NodePose],
    a: &[NodePose],
    b: &[NodePose],
    t: f32,
) -> Result<usize, SkeletonError> {
    check_len(dst.len(), a.len())?;
    check_len(dst.len(), b.len())?;
    for ((out, pa), pb) in dst.iter_mut().zip(a).zip(b) {
        *out = NodePose::lerp(pa, pb, t);
    }
    Ok(dst.len())
}

fn check_len(expected: usize, actual: usize) -> Result<(), SkeletonError> {
    if expected != actual {
        return Err(SkeletonError::invalid(format!(
            "pose length mismatch: expected {expected} node poses, got {actual}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_pose_converts_to_identity_matrix() {
        let m = NodePose::identity().to_matrix(PoseChannels::ALL);
        assert_relative_eq!(m, Matrix4::identity());
    }

    #[test]
    fn unselected_channels_contribute_identity() {
        let pose = NodePose {
            translation: Vector3::new(1.0, 2.0, 3.0),
            rotation: Vector3::new(0.0, 0.0, FRAC_PI_2),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let t_only = pose.to_matrix(PoseChannels::TRANSLATE);
        assert_relative_eq!(
            t_only,
            Translation3::new(1.0, 2.0, 3.0).to_homogeneous()
        );

        // rotate+translate ignores the scale channel entirely
        let rt = pose.to_matrix(PoseChannels::ROTATE | PoseChannels::TRANSLATE);
        let x_axis = rt.transform_vector(&Vector3::x());
        assert_relative_eq!(x_axis, Vector3::y(), epsilon = 1e-6);
    }

    #[test]
    fn copy_and_lerp_check_lengths() {
        let a = vec![NodePose::identity(); 3];
        let b = vec![NodePose::from_translation(Vector3::new(2.0, 0.0, 0.0)); 3];
        let mut dst = vec![NodePose::identity(); 3];

        assert_eq!(pose_lerp(&mut dst, &a, &b, 0.25).unwrap(), 3);
        assert_relative_eq!(dst[1].translation.x, 0.5);

        assert_eq!(pose_copy(&mut dst, &b).unwrap(), 3);
        assert_eq!(dst, b);

        let short = vec![NodePose::identity(); 2];
        assert!(pose_copy(&mut dst, &short).is_err());

        assert_eq!(pose_reset(&mut dst), 3);
        assert_eq!(dst, a);
    }

    #[test]
    fn per_node_flags() {
        let mut flags = HierarchyPoseFlags::new(2, PoseChannels::ALL);
        flags.set(1, PoseChannels::ROTATE).unwrap();
        assert_eq!(flags.get(1), Some(PoseChannels::ROTATE));
        assert!(flags.set(5, PoseChannels::SCALE).is_err());
    }
}
