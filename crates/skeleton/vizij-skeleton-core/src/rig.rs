//! One animated skeleton instance: a clip controller driving a hierarchy
//! state, evaluated once per frame.
//!
//! Frame pipeline: update controller, resolve the current keyframe's sample
//! to a key pose, load (or blend) it into the working pose, convert to local
//! matrices, solve forward kinematics, then build bind-to-current matrices.

use std::sync::Arc;

use nalgebra::Matrix4;
use tracing::debug;

use crate::clip::ClipPool;
use crate::config::Config;
use crate::controller::ClipController;
use crate::error::SkeletonError;
use crate::keyframe::{KeyframePool, SampleRef};
use crate::kinematics::{convert_local_pose, solve_forward, update_object_bind_to_current};
use crate::pose_group::HierarchyPoseGroup;
use crate::state::HierarchyState;

/// Maps a keyframe's opaque sample reference to a key pose index.
pub trait SampleResolver {
    fn pose_index(&self, sample: SampleRef) -> Option<usize>;
}

impl<F> SampleResolver for F
where
    F: Fn(SampleRef) -> Option<usize>,
{
    fn pose_index(&self, sample: SampleRef) -> Option<usize> {
        self(sample)
    }
}

/// Treats the sample reference as the key pose index itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleAsPoseIndex;

impl SampleResolver for SampleAsPoseIndex {
    fn pose_index(&self, sample: SampleRef) -> Option<usize> {
        usize::try_from(sample.0).ok()
    }
}

#[derive(Debug)]
pub struct Rig {
    state: HierarchyState,
    controller: ClipController,
    bind_inverse: Vec<Matrix4<f32>>,
    config: Config,
    blend_keyframes: bool,
}

impl Rig {
    /// Create a state over `pose_group` and capture key pose 0 as the bind pose.
    pub fn new(
        pose_group: Arc<HierarchyPoseGroup>,
        controller: ClipController,
        config: Config,
    ) -> Result<Self, SkeletonError> {
        config.validate()?;
        let state = HierarchyState::new(pose_group)?;
        let mut rig = Self {
            state,
            controller: controller.with_config(&config),
            bind_inverse: Vec::new(),
            config,
            blend_keyframes: false,
        };
        rig.capture_bind_pose(0)?;
        Ok(rig)
    }

    /// Blend toward the next keyframe's pose by keyframe phase instead of
    /// holding the current pose for the whole keyframe.
    pub fn with_keyframe_blending(mut self, enabled: bool) -> Self {
        self.blend_keyframes = enabled;
        self
    }

    /// Solve key pose `pose_index` and keep its object-space inverses as the
    /// bind pose. Returns the node count.
    pub fn capture_bind_pose(&mut self, pose_index: usize) -> Result<usize, SkeletonError> {
        self.state.load_pose(pose_index)?;
        self.solve()?;
        self.state.update_object_inverse()?;
        self.bind_inverse = self.state.capture_bind_inverse();
        let count = update_object_bind_to_current(&mut self.state, &self.bind_inverse)?;
        debug!(pose_index, node_count = count, "bind pose captured");
        Ok(count)
    }

    /// Advance the controller by `dt` and rebuild every matrix buffer.
    /// Returns the number of boundary crossings the controller resolved.
    /// On error the controller keeps its previous playhead.
    pub fn animate<R: SampleResolver + ?Sized>(
        &mut self,
        dt: f32,
        clips: &ClipPool,
        keyframes: &KeyframePool,
        resolver: &R,
    ) -> Result<usize, SkeletonError> {
        let mut controller = self.controller.clone();
        let crossings = controller.update(clips, keyframes, dt)?;
        let (pose, next_pose) = self.keyframe_poses(&controller, clips, keyframes, resolver)?;
        match next_pose {
            Some(next) => self
                .state
                .blend_poses(pose, next, controller.keyframe_phase())?,
            None => self.state.load_pose(pose)?,
        };
        self.solve()?;
        update_object_bind_to_current(&mut self.state, &self.bind_inverse)?;
        self.controller = controller;
        Ok(crossings)
    }

    /// Key pose of the controller's current keyframe, plus the pose to blend
    /// toward when keyframe blending is on. Both are checked against the pose
    /// group before anything is written.
    fn keyframe_poses<R: SampleResolver + ?Sized>(
        &self,
        controller: &ClipController,
        clips: &ClipPool,
        keyframes: &KeyframePool,
        resolver: &R,
    ) -> Result<(usize, Option<usize>), SkeletonError> {
        let current = keyframes.keyframe(controller.keyframe_index())?;
        let pose = self.checked_pose(resolve(resolver, current.sample())?)?;
        if !self.blend_keyframes {
            return Ok((pose, None));
        }

        // The last keyframe of a clip holds its own pose.
        let clip_index = controller.clip_index().ok_or(SkeletonError::NotInitialized {
            what: "clip controller",
        })?;
        let clip = clips.clip(clip_index)?;
        let next_index = clip
            .keyframe_index(controller.keyframe_offset() + 1)
            .unwrap_or(controller.keyframe_index());
        let next_pose = resolve(resolver, keyframes.keyframe(next_index)?.sample())?;
        Ok((pose, Some(self.checked_pose(next_pose)?)))
    }

    fn checked_pose(&self, index: usize) -> Result<usize, SkeletonError> {
        let count = self
            .state
            .pose_group()
            .map_or(0, |group| group.pose_count());
        if index >= count {
            return Err(SkeletonError::IndexOutOfRange {
                what: "pose",
                index,
                count,
            });
        }
        Ok(index)
    }

    /// Local matrices and forward kinematics for the working pose. Inverses
    /// are only needed for the bind pose, so a degenerate animated pose (a
    /// zero scale, say) still solves.
    fn solve(&mut self) -> Result<usize, SkeletonError> {
        convert_local_pose(&mut self.state, self.config.pose_channels)?;
        solve_forward(&mut self.state)
    }

    #[inline]
    pub fn state(&self) -> &HierarchyState {
        &self.state
    }

    #[inline]
    pub fn controller(&self) -> &ClipController {
        &self.controller
    }

    #[inline]
    pub fn controller_mut(&mut self) -> &mut ClipController {
        &mut self.controller
    }

    #[inline]
    pub fn bind_inverse(&self) -> &[Matrix4<f32>] {
        &self.bind_inverse
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn resolve<R: SampleResolver + ?Sized>(
    resolver: &R,
    sample: SampleRef,
) -> Result<usize, SkeletonError> {
    resolver
        .pose_index(sample)
        .ok_or_else(|| SkeletonError::NotFound {
            what: "key pose for sample",
            name: sample.0.to_string(),
        })
}
