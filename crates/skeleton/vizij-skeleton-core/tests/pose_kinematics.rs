use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Point3, Translation3, Vector3};
use vizij_skeleton_core::{
    convert_local_pose, pose_convert_per_node, solve_forward, solve_forward_partial,
    update_object_bind_to_current, update_object_bind_to_current_self, Hierarchy,
    HierarchyPoseFlags, HierarchyPoseGroup, HierarchyState, NodePose, PoseChannels,
    SkeletonError, StatusCode,
};

fn chain() -> Arc<Hierarchy> {
    Arc::new(
        Hierarchy::builder()
            .node("root", None)
            .node("a", Some("root"))
            .node("b", Some("a"))
            .build()
            .expect("chain hierarchy"),
    )
}

fn chain_group() -> Arc<HierarchyPoseGroup> {
    let mut group = HierarchyPoseGroup::new(chain(), 2).expect("pose group");
    let pose = group.pose_mut(0).unwrap();
    pose[0] = NodePose::from_translation(Vector3::new(1.0, 0.0, 0.0));
    pose[1] = NodePose::from_translation(Vector3::new(0.0, 1.0, 0.0));
    pose[2] = NodePose::from_translation(Vector3::new(0.0, 0.0, 1.0));
    let pose = group.pose_mut(1).unwrap();
    pose[1] = NodePose::from_rotation(Vector3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2));
    pose[2] = NodePose::from_translation(Vector3::new(1.0, 0.0, 0.0));
    Arc::new(group)
}

#[test]
fn pose_group_round_trip() {
    let mut group = HierarchyPoseGroup::default();
    assert_eq!(group.create(chain(), 3).unwrap(), 3);
    assert!(group.poses().all(|p| p.node_count() == 3));
    assert!(group
        .node_poses()
        .iter()
        .all(|p| *p == NodePose::identity()));

    assert_eq!(group.release().unwrap(), 3);
    assert!(!group.is_initialized());
    assert_eq!(group.pose_count(), 0);
    assert!(group.node_poses().is_empty());
    assert_eq!(group.release().status(), -1);

    // a released group can be created again
    assert_eq!(group.create(chain(), 1).unwrap(), 1);
    assert!(matches!(
        group.create(chain(), 1),
        Err(SkeletonError::AlreadyInitialized { .. })
    ));
}

#[test]
fn pose_group_rejects_zero_poses() {
    let mut group = HierarchyPoseGroup::default();
    assert!(group.create(chain(), 0).is_err());
    assert!(!group.is_initialized());
}

#[test]
fn state_lifecycle() {
    let group = chain_group();
    let mut state = HierarchyState::default();
    assert_eq!(state.create(Arc::clone(&group)).unwrap(), 3);
    assert_eq!(state.local_space().len(), 3);
    assert_eq!(state.object_space_bind_to_current().len(), 3);
    assert!(state
        .object_space()
        .iter()
        .all(|m| *m == Matrix4::identity()));
    assert!(state.create(Arc::clone(&group)).is_err());

    assert_eq!(state.release().unwrap(), 3);
    assert_eq!(state.release().status(), -1);
    assert!(solve_forward(&mut state).is_err());

    let uninitialized = Arc::new(HierarchyPoseGroup::default());
    assert!(matches!(
        HierarchyState::new(uninitialized),
        Err(SkeletonError::NotInitialized { .. })
    ));
}

#[test]
fn chain_composes_translations() {
    let mut state = HierarchyState::new(chain_group()).unwrap();
    state.load_pose(0).unwrap();
    convert_local_pose(&mut state, PoseChannels::ALL).unwrap();
    assert_eq!(solve_forward(&mut state).unwrap(), 3);

    let expected = Translation3::new(1.0, 1.0, 1.0).to_homogeneous();
    assert_relative_eq!(state.object_space()[2], expected);
    // root object space is its local space
    assert_relative_eq!(state.object_space()[0], state.local_space()[0]);
}

#[test]
fn rotation_propagates_to_children() {
    let mut state = HierarchyState::new(chain_group()).unwrap();
    state.load_pose(1).unwrap();
    convert_local_pose(&mut state, PoseChannels::ROTATE | PoseChannels::TRANSLATE).unwrap();
    solve_forward(&mut state).unwrap();

    let tip = state.object_space()[2].transform_point(&Point3::origin());
    assert_relative_eq!(tip, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
}

#[test]
fn partial_solve_updates_only_the_range() {
    let mut state = HierarchyState::new(chain_group()).unwrap();
    state.load_pose(0).unwrap();
    convert_local_pose(&mut state, PoseChannels::ALL).unwrap();
    solve_forward(&mut state).unwrap();

    state.local_pose_mut()[2] = NodePose::from_translation(Vector3::new(0.0, 0.0, 5.0));
    convert_local_pose(&mut state, PoseChannels::ALL).unwrap();
    assert_eq!(solve_forward_partial(&mut state, 2, 1).unwrap(), 1);
    assert_relative_eq!(
        state.object_space()[2],
        Translation3::new(1.0, 1.0, 5.0).to_homogeneous()
    );
    assert!(matches!(
        solve_forward_partial(&mut state, 2, 2),
        Err(SkeletonError::IndexOutOfRange { .. })
    ));
}

#[test]
fn bind_to_current_is_identity_in_bind_pose() {
    let mut state = HierarchyState::new(chain_group()).unwrap();
    state.load_pose(0).unwrap();
    convert_local_pose(&mut state, PoseChannels::ALL).unwrap();
    solve_forward(&mut state).unwrap();
    state.update_object_inverse().unwrap();
    let bind_inverse = state.capture_bind_inverse();

    update_object_bind_to_current(&mut state, &bind_inverse).unwrap();
    for m in state.object_space_bind_to_current() {
        assert_relative_eq!(*m, Matrix4::identity(), epsilon = 1e-6);
    }

    // moving the chain moves bind-space vertices with it
    state.blend_poses(0, 1, 1.0).unwrap();
    convert_local_pose(&mut state, PoseChannels::ALL).unwrap();
    solve_forward(&mut state).unwrap();
    update_object_bind_to_current(&mut state, &bind_inverse).unwrap();
    let moved = state.object_space_bind_to_current()[2].transform_point(&Point3::new(1.0, 1.0, 1.0));
    assert_relative_eq!(moved, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-6);

    assert!(update_object_bind_to_current(&mut state, &bind_inverse[..2]).is_err());
    assert_eq!(update_object_bind_to_current_self(&mut state).unwrap(), 3);
}

#[test]
fn per_node_flags_select_channels() {
    let pose = [
        NodePose {
            translation: Vector3::new(1.0, 2.0, 3.0),
            rotation: Vector3::zeros(),
            scale: Vector3::repeat(2.0),
        };
        2
    ];
    let mut flags = HierarchyPoseFlags::new(2, PoseChannels::ALL);
    flags.set(1, PoseChannels::TRANSLATE).unwrap();
    let mut out = [Matrix4::identity(); 2];
    pose_convert_per_node(&mut out, &pose, &flags).unwrap();

    assert_relative_eq!(out[0][(0, 0)], 2.0);
    assert_relative_eq!(out[1][(0, 0)], 1.0);
    assert_relative_eq!(out[1][(1, 3)], 2.0);

    let short = HierarchyPoseFlags::new(1, PoseChannels::ALL);
    assert!(pose_convert_per_node(&mut out, &pose, &short).is_err());
}

#[test]
fn singular_object_matrix_is_reported() {
    let mut group = HierarchyPoseGroup::new(chain(), 1).unwrap();
    group.pose_mut(0).unwrap()[1].scale = Vector3::zeros();
    let mut state = HierarchyState::new(Arc::new(group)).unwrap();
    state.load_pose(0).unwrap();
    convert_local_pose(&mut state, PoseChannels::ALL).unwrap();
    solve_forward(&mut state).unwrap();

    let before = state.object_space_inverse().to_vec();
    assert!(state.update_object_inverse().is_err());
    assert_eq!(state.object_space_inverse(), before.as_slice());
}
