//! Pose conversion and forward kinematics.
//!
//! Matrices are column-major and compose as `parent * child`, so
//! `object[i] = object[parent(i)] * local[i]`.

use nalgebra::Matrix4;

use crate::error::SkeletonError;
use crate::pose::{HierarchyPoseFlags, NodePose, PoseChannels};
use crate::state::HierarchyState;

/// Convert node-poses into local matrices using the same channels for every node.
pub fn pose_convert(
    out: &mut [Matrix4<f32>],
    pose: &[NodePose],
    channels: PoseChannels,
) -> Result<usize, SkeletonError> {
    check_len("local matrices", pose.len(), out.len())?;
    for (m, node) in out.iter_mut().zip(pose) {
        *m = node.to_matrix(channels);
    }
    Ok(out.len())
}

/// Convert node-poses into local matrices with per-node channel flags.
pub fn pose_convert_per_node(
    out: &mut [Matrix4<f32>],
    pose: &[NodePose],
    flags: &HierarchyPoseFlags,
) -> Result<usize, SkeletonError> {
    check_len("local matrices", pose.len(), out.len())?;
    check_len("pose flags", pose.len(), flags.as_slice().len())?;
    for ((m, node), channels) in out.iter_mut().zip(pose).zip(flags.as_slice()) {
        *m = node.to_matrix(*channels);
    }
    Ok(out.len())
}

/// Convert the state's working pose into its local-space matrices.
pub fn convert_local_pose(
    state: &mut HierarchyState,
    channels: PoseChannels,
) -> Result<usize, SkeletonError> {
    let buffers = state.buffers_mut()?;
    pose_convert(buffers.local_space, buffers.local_pose, channels)
}

/// Compose local matrices into object space in one pass over the hierarchy.
pub fn solve_forward(state: &mut HierarchyState) -> Result<usize, SkeletonError> {
    let count = state.node_count();
    solve_forward_partial(state, 0, count)
}

/// Re-solve `count` nodes starting at `first`. Parents of the range must
/// already hold valid object-space matrices.
pub fn solve_forward_partial(
    state: &mut HierarchyState,
    first: usize,
    count: usize,
) -> Result<usize, SkeletonError> {
    let buffers = state.buffers_mut()?;
    let n = buffers.local_space.len();
    let end = first
        .checked_add(count)
        .filter(|end| *end <= n)
        .ok_or(SkeletonError::IndexOutOfRange {
            what: "node",
            index: first.saturating_add(count).saturating_sub(1),
            count: n,
        })?;

    let object = buffers.object_space;
    let local = buffers.local_space;
    for i in first..end {
        object[i] = match buffers.hierarchy.parent_index(i) {
            Some(p) => object[p] * local[i],
            None => local[i],
        };
    }
    Ok(count)
}

/// `bind_to_current[i] = object[i] * bind_inverse[i]`: moves bind-pose
/// vertices into the current pose.
pub fn update_object_bind_to_current(
    state: &mut HierarchyState,
    bind_inverse: &[Matrix4<f32>],
) -> Result<usize, SkeletonError> {
    let buffers = state.buffers_mut()?;
    check_len("bind-pose inverses", buffers.object_space.len(), bind_inverse.len())?;
    for ((out, object), inverse) in buffers
        .bind_to_current
        .iter_mut()
        .zip(buffers.object_space.iter())
        .zip(bind_inverse)
    {
        *out = object * inverse;
    }
    Ok(bind_inverse.len())
}

/// Use the state's own object-space inverses as the bind pose.
pub fn update_object_bind_to_current_self(
    state: &mut HierarchyState,
) -> Result<usize, SkeletonError> {
    let buffers = state.buffers_mut()?;
    for ((out, object), inverse) in buffers
        .bind_to_current
        .iter_mut()
        .zip(buffers.object_space.iter())
        .zip(buffers.object_space_inverse.iter())
    {
        *out = object * inverse;
    }
    Ok(buffers.bind_to_current.len())
}

fn check_len(what: &str, expected: usize, actual: usize) -> Result<(), SkeletonError> {
    if expected != actual {
        return Err(SkeletonError::invalid(format!(
            "{what}: expected {expected} entries, got {actual}"
        )));
    }
    Ok(())
}
