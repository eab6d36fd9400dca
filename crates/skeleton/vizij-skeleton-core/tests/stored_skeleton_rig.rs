use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Point3, Vector3};
use vizij_skeleton_core::{
    parse_stored_skeleton_json, BoundaryAction, ClipController, ClipPool, Config, Hierarchy,
    HierarchyPoseGroup, KeyframePool, MotionImporter, NodePose, PlayDirection, PoseChannels, Rig,
    SampleAsPoseIndex, SampleRef, SkeletonError, StoredSkeletonImporter,
};

fn init_tracing() {
    let default_filter = "vizij_skeleton_core=debug";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// One keyframe per key pose of the arm fixture, one second each.
fn arm_clip() -> (ClipPool, KeyframePool) {
    let mut keyframes = KeyframePool::new(3).unwrap();
    for i in 0..3 {
        keyframes.init_keyframe(i, 1.0, SampleRef(i as u32)).unwrap();
    }
    let mut clips = ClipPool::new(1).unwrap();
    clips.init_clip(0, "reach", &keyframes, 0, 2).unwrap();
    (clips, keyframes)
}

fn arm_rig(clips: &ClipPool) -> Rig {
    let json = vizij_test_fixtures::skeletons::json("three-link-arm").expect("arm fixture");
    let motion = parse_stored_skeleton_json(&json).expect("parse arm fixture");
    let (_, poses) = motion.into_shared();
    let controller = ClipController::new(
        "arm",
        clips,
        0,
        BoundaryAction::Loop,
        BoundaryAction::Loop,
        PlayDirection::Forward,
    )
    .unwrap();
    Rig::new(poses, controller, Config::default()).expect("rig")
}

fn tip(rig: &Rig) -> Point3<f32> {
    rig.state().object_space()[2].transform_point(&Point3::origin())
}

#[test]
fn fixtures_parse() {
    init_tracing();
    for key in vizij_test_fixtures::skeletons::keys() {
        let json = vizij_test_fixtures::skeletons::json(&key).unwrap();
        let motion = parse_stored_skeleton_json(&json).unwrap();
        assert_eq!(motion.name, key);
        assert!(motion.poses.poses().all(|p| p.node_count() == motion.hierarchy.node_count()));
    }
}

#[test]
fn fixture_documents_load_as_json() {
    let doc: serde_json::Value = vizij_test_fixtures::skeletons::load("biped-rest").unwrap();
    assert_eq!(doc["nodes"].as_array().unwrap().len(), 7);
    assert!(vizij_test_fixtures::skeletons::load::<serde_json::Value>("no-such-rig").is_err());
}

#[test]
fn importer_reads_from_disk() {
    let path = vizij_test_fixtures::skeletons::path("biped-rest").unwrap();
    let motion = StoredSkeletonImporter.import(&path).unwrap();
    assert_eq!(motion.pose_count(), 1);
    assert_eq!(motion.hierarchy.node_count(), 7);
    assert_eq!(motion.hierarchy.node_index("shin.r"), Some(6));
    assert!(motion.hierarchy.is_ancestor_of(0, 4));

    let missing = StoredSkeletonImporter.import(&path.with_file_name("missing.json"));
    assert!(matches!(missing, Err(SkeletonError::Io { .. })));
}

#[test]
fn rig_follows_the_clip() {
    init_tracing();
    let (clips, keyframes) = arm_clip();
    let mut rig = arm_rig(&clips);

    // bind pose is key pose 0: arm stretched along +x
    rig.animate(0.0, &clips, &keyframes, &SampleAsPoseIndex).unwrap();
    assert_relative_eq!(tip(&rig), Point3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
    for m in rig.state().object_space_bind_to_current() {
        assert_relative_eq!(*m, Matrix4::identity(), epsilon = 1e-5);
    }

    // second keyframe bends the upper link by a quarter turn
    assert_eq!(rig.animate(1.5, &clips, &keyframes, &SampleAsPoseIndex).unwrap(), 1);
    assert_relative_eq!(tip(&rig), Point3::new(1.0, 1.0, 0.0), epsilon = 1e-5);
    let skinned = rig.state().object_space_bind_to_current()[2]
        .transform_point(&Point3::new(2.0, 0.0, 0.0));
    assert_relative_eq!(skinned, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-5);

    // third keyframe lifts the base
    rig.animate(1.0, &clips, &keyframes, &SampleAsPoseIndex).unwrap();
    assert_eq!(rig.controller().keyframe_offset(), 2);
    assert_relative_eq!(tip(&rig), Point3::new(2.0, 0.0, 2.0), epsilon = 1e-5);

    // and the loop brings it back
    rig.animate(1.0, &clips, &keyframes, &SampleAsPoseIndex).unwrap();
    assert_eq!(rig.controller().keyframe_offset(), 0);
    assert_relative_eq!(tip(&rig), Point3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
}

#[test]
fn rig_blends_between_keyframes() {
    let (clips, keyframes) = arm_clip();
    let mut rig = arm_rig(&clips).with_keyframe_blending(true);

    rig.animate(0.5, &clips, &keyframes, &SampleAsPoseIndex).unwrap();
    let half = std::f32::consts::FRAC_1_SQRT_2;
    assert_relative_eq!(tip(&rig), Point3::new(1.0 + half, half, 0.0), epsilon = 1e-4);
}

#[test]
fn rig_uses_custom_resolver() {
    let (clips, keyframes) = arm_clip();
    let mut rig = arm_rig(&clips);

    // every keyframe shows key pose 1
    let always_bent = |_: SampleRef| Some(1usize);
    rig.animate(0.25, &clips, &keyframes, &always_bent).unwrap();
    assert_relative_eq!(tip(&rig), Point3::new(1.0, 1.0, 0.0), epsilon = 1e-5);

    let nothing = |_: SampleRef| -> Option<usize> { None };
    let err = rig.animate(0.25, &clips, &keyframes, &nothing).unwrap_err();
    assert_eq!(err.category(), "lookup");
}

#[test]
fn failed_frame_keeps_the_playhead() {
    let (clips, keyframes) = arm_clip();
    let mut rig = arm_rig(&clips);
    rig.animate(0.25, &clips, &keyframes, &SampleAsPoseIndex).unwrap();
    let before = rig.controller().clone();
    let tip_before = tip(&rig);

    let nothing = |_: SampleRef| -> Option<usize> { None };
    assert!(rig.animate(1.0, &clips, &keyframes, &nothing).is_err());
    assert_eq!(rig.controller(), &before);

    // a sample pointing past the pose group fails before the pose is touched
    let past_end = |_: SampleRef| Some(3usize);
    let err = rig.animate(1.0, &clips, &keyframes, &past_end).unwrap_err();
    assert!(matches!(
        err,
        SkeletonError::IndexOutOfRange { what: "pose", index: 3, count: 3 }
    ));
    assert_eq!(rig.controller(), &before);
    assert_relative_eq!(tip(&rig), tip_before, epsilon = 1e-6);

    // the same step goes through once the resolver can answer
    assert_eq!(rig.animate(1.0, &clips, &keyframes, &SampleAsPoseIndex).unwrap(), 1);
    assert_eq!(rig.controller().keyframe_offset(), 1);
    assert_relative_eq!(rig.controller().keyframe_time(), 0.25);
}

#[test]
fn zero_scale_pose_still_animates() {
    let hierarchy = Arc::new(
        Hierarchy::builder()
            .node("root", None)
            .node("blade", Some("root"))
            .build()
            .unwrap(),
    );
    let mut group = HierarchyPoseGroup::new(hierarchy, 2).unwrap();
    group.pose_mut(0).unwrap()[1] = NodePose::from_translation(Vector3::new(1.0, 0.0, 0.0));
    group.pose_mut(1).unwrap()[1] = NodePose {
        scale: Vector3::zeros(),
        ..NodePose::from_translation(Vector3::new(1.0, 0.0, 0.0))
    };

    let mut keyframes = KeyframePool::new(2).unwrap();
    keyframes.init_keyframe(0, 1.0, SampleRef(0)).unwrap();
    keyframes.init_keyframe(1, 1.0, SampleRef(1)).unwrap();
    let mut clips = ClipPool::new(1).unwrap();
    clips.init_clip(0, "vanish", &keyframes, 0, 1).unwrap();
    let controller = ClipController::new(
        "blade",
        &clips,
        0,
        BoundaryAction::Stop,
        BoundaryAction::Stop,
        PlayDirection::Forward,
    )
    .unwrap();
    let config = Config::default().with_pose_channels(PoseChannels::ALL);
    let mut rig = Rig::new(Arc::new(group), controller, config).unwrap();

    assert_eq!(rig.animate(1.5, &clips, &keyframes, &SampleAsPoseIndex).unwrap(), 1);
    assert_eq!(rig.controller().keyframe_offset(), 1);
    let blade = rig.state().object_space()[1];
    assert_relative_eq!(blade[(0, 0)], 0.0);
    assert_relative_eq!(blade[(0, 3)], 1.0);
    assert_relative_eq!(rig.state().object_space_bind_to_current()[1][(0, 0)], 0.0);
}
