//! Clip controller: the playback head over one clip of a [`ClipPool`].
//!
//! Time advances inside the current keyframe. When it runs past either edge
//! the head steps to the neighbouring keyframe, carrying the overshoot; past
//! the first or last keyframe of the clip the boundary action for that
//! direction decides what happens. One update may cross many boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::clip::{Clip, ClipPool};
use crate::config::Config;
use crate::error::SkeletonError;
use crate::keyframe::{Keyframe, KeyframePool};
use crate::names::bounded_name;

const DEFAULT_CONTROLLER_NAME: &str = "clip controller";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum PlayDirection {
    Reverse = -1,
    #[default]
    Stop = 0,
    Forward = 1,
}

impl PlayDirection {
    #[inline]
    pub fn sign(self) -> f32 {
        f32::from(self as i8)
    }

    #[inline]
    pub fn reversed(self) -> Self {
        match self {
            Self::Reverse => Self::Forward,
            Self::Stop => Self::Stop,
            Self::Forward => Self::Reverse,
        }
    }
}

impl fmt::Display for PlayDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Reverse => "reverse",
            Self::Stop => "stopped",
            Self::Forward => "forward",
        };
        f.write_str(label)
    }
}

/// What happens when playback runs off either end of a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryAction {
    /// Clamp to the edge and stop.
    #[default]
    Stop,
    /// Wrap to the opposite end, keeping direction.
    Loop,
    /// Bounce back from the edge, reversing direction.
    PingPong,
}

/// Position part of the controller, updated on a copy and committed whole.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Playhead {
    offset: usize,
    time: f32,
    direction: PlayDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipController {
    name: String,
    clip_index: Option<usize>,
    keyframe_offset: usize,
    keyframe_index: usize,
    keyframe_time: f32,
    keyframe_phase: f32,
    clip_time: f32,
    clip_phase: f32,
    direction: PlayDirection,
    forward_action: BoundaryAction,
    reverse_action: BoundaryAction,
    max_boundary_crossings: usize,
    duration_epsilon: f32,
}

impl Default for ClipController {
    fn default() -> Self {
        let config = Config::default();
        Self {
            name: DEFAULT_CONTROLLER_NAME.to_string(),
            clip_index: None,
            keyframe_offset: 0,
            keyframe_index: 0,
            keyframe_time: 0.0,
            keyframe_phase: 0.0,
            clip_time: 0.0,
            clip_phase: 0.0,
            direction: PlayDirection::Stop,
            forward_action: BoundaryAction::Stop,
            reverse_action: BoundaryAction::Stop,
            max_boundary_crossings: config.max_boundary_crossings,
            duration_epsilon: config.duration_epsilon,
        }
    }
}

impl ClipController {
    pub fn new(
        name: &str,
        clips: &ClipPool,
        clip_index: usize,
        forward_action: BoundaryAction,
        reverse_action: BoundaryAction,
        direction: PlayDirection,
    ) -> Result<Self, SkeletonError> {
        let mut controller = Self::default();
        controller.init(
            name,
            clips,
            clip_index,
            forward_action,
            reverse_action,
            direction,
        )?;
        Ok(controller)
    }

    /// Take the crossing guard and zero-duration threshold from `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.max_boundary_crossings = config.max_boundary_crossings;
        self.duration_epsilon = config.duration_epsilon;
        self
    }

    /// Bind to `clip_index` and set policies and direction. Returns the clip index.
    pub fn init(
        &mut self,
        name: &str,
        clips: &ClipPool,
        clip_index: usize,
        forward_action: BoundaryAction,
        reverse_action: BoundaryAction,
        direction: PlayDirection,
    ) -> Result<usize, SkeletonError> {
        self.set_clip(clips, clip_index)?;
        self.name = bounded_name(name, DEFAULT_CONTROLLER_NAME);
        self.forward_action = forward_action;
        self.reverse_action = reverse_action;
        self.direction = direction;
        Ok(clip_index)
    }

    /// Rebind to another clip and rewind to its first keyframe.
    pub fn set_clip(&mut self, clips: &ClipPool, clip_index: usize) -> Result<usize, SkeletonError> {
        let clip = clips.clip(clip_index)?;
        if !clip.is_initialized() {
            return Err(SkeletonError::NotInitialized { what: "clip" });
        }
        self.clip_index = Some(clip_index);
        self.keyframe_offset = 0;
        self.keyframe_index = clip.first_keyframe();
        self.keyframe_time = 0.0;
        self.keyframe_phase = 0.0;
        self.clip_time = 0.0;
        self.clip_phase = 0.0;
        Ok(clip_index)
    }

    #[inline]
    pub fn set_play_direction(&mut self, direction: PlayDirection) {
        self.direction = direction;
    }

    #[inline]
    pub fn set_boundary_actions(&mut self, forward: BoundaryAction, reverse: BoundaryAction) {
        self.forward_action = forward;
        self.reverse_action = reverse;
    }

    #[inline]
    pub fn set_loop(&mut self) {
        self.set_boundary_actions(BoundaryAction::Loop, BoundaryAction::Loop);
    }

    #[inline]
    pub fn set_ping_pong(&mut self) {
        self.set_boundary_actions(BoundaryAction::PingPong, BoundaryAction::PingPong);
    }

    pub fn set_crossing_limit(&mut self, limit: usize) -> Result<(), SkeletonError> {
        if limit == 0 {
            return Err(SkeletonError::invalid("crossing limit must be greater than 0"));
        }
        self.max_boundary_crossings = limit;
        Ok(())
    }

    /// Advance playback by `dt` seconds and resolve every boundary crossed.
    /// Returns the number of crossings. On error the controller is unchanged.
    pub fn update(
        &mut self,
        clips: &ClipPool,
        keyframes: &KeyframePool,
        dt: f32,
    ) -> Result<usize, SkeletonError> {
        if !dt.is_finite() {
            return Err(SkeletonError::InvalidTime {
                time: f64::from(dt),
            });
        }
        let clip_index = self.clip_index.ok_or(SkeletonError::NotInitialized {
            what: "clip controller",
        })?;
        if self.direction == PlayDirection::Stop {
            return Ok(0);
        }

        let clip = clips.clip(clip_index)?;
        let frames = clip.keyframes(keyframes)?;
        if self.keyframe_offset >= frames.len() {
            return Err(SkeletonError::IndexOutOfRange {
                what: "keyframe in clip",
                index: self.keyframe_offset,
                count: frames.len(),
            });
        }
        let total: f32 = frames.iter().map(Keyframe::duration).sum();
        if total <= self.duration_epsilon {
            warn!(clip = clip.name(), total, "clip has no playable duration");
            return Err(SkeletonError::DegenerateTiming {
                reason: format!("clip '{}' has zero total duration", clip.name()),
            });
        }

        let mut head = Playhead {
            offset: self.keyframe_offset,
            time: self.keyframe_time + dt * self.direction.sign(),
            direction: self.direction,
        };
        let crossings = self.resolve(&mut head, frames, total)?;

        let duration = frames[head.offset].duration();
        let clip_time = Clip::keyframe_start(frames, head.offset) + head.time;
        self.keyframe_offset = head.offset;
        self.keyframe_index = clip.first_keyframe() + head.offset;
        self.keyframe_time = head.time;
        self.keyframe_phase = if duration > self.duration_epsilon {
            head.time / duration
        } else {
            0.0
        };
        self.clip_time = clip_time;
        self.clip_phase = clip_time / total;
        self.direction = head.direction;

        if crossings > 0 {
            trace!(
                controller = %self.name,
                crossings,
                keyframe = self.keyframe_index,
                direction = %self.direction,
                "boundary crossings resolved"
            );
        }
        Ok(crossings)
    }

    fn resolve(
        &self,
        head: &mut Playhead,
        frames: &[Keyframe],
        total: f32,
    ) -> Result<usize, SkeletonError> {
        let last = frames.len() - 1;
        let mut crossings = 0;

        loop {
            let duration = frames[head.offset].duration();
            match head.direction {
                PlayDirection::Forward if head.time > duration => {
                    let overshoot = head.time - duration;
                    if head.offset < last {
                        head.offset += 1;
                        head.time = overshoot;
                    } else {
                        match self.forward_action {
                            BoundaryAction::Stop => {
                                head.time = duration;
                                head.direction = PlayDirection::Stop;
                            }
                            BoundaryAction::Loop => {
                                head.offset = 0;
                                head.time = overshoot % total;
                            }
                            BoundaryAction::PingPong => {
                                head.direction = PlayDirection::Reverse;
                                head.time = duration
                                    - bounce_overshoot(self.reverse_action, overshoot, total);
                            }
                        }
                    }
                }
                PlayDirection::Reverse if head.time < 0.0 => {
                    let overshoot = -head.time;
                    if head.offset > 0 {
                        head.offset -= 1;
                        head.time = frames[head.offset].duration() - overshoot;
                    } else {
                        match self.reverse_action {
                            BoundaryAction::Stop => {
                                head.time = 0.0;
                                head.direction = PlayDirection::Stop;
                            }
                            BoundaryAction::Loop => {
                                head.offset = last;
                                head.time = frames[last].duration() - overshoot % total;
                            }
                            BoundaryAction::PingPong => {
                                head.direction = PlayDirection::Forward;
                                head.time = bounce_overshoot(self.forward_action, overshoot, total);
                            }
                        }
                    }
                }
                _ => return Ok(crossings),
            }

            crossings += 1;
            if crossings > self.max_boundary_crossings {
                warn!(
                    controller = %self.name,
                    limit = self.max_boundary_crossings,
                    "update exceeded boundary crossing limit"
                );
                return Err(SkeletonError::CrossingLimitExceeded {
                    limit: self.max_boundary_crossings,
                });
            }
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn clip_index(&self) -> Option<usize> {
        self.clip_index
    }

    /// Position of the current keyframe within the clip.
    #[inline]
    pub fn keyframe_offset(&self) -> usize {
        self.keyframe_offset
    }

    /// Pool index of the current keyframe.
    #[inline]
    pub fn keyframe_index(&self) -> usize {
        self.keyframe_index
    }

    #[inline]
    pub fn keyframe_time(&self) -> f32 {
        self.keyframe_time
    }

    #[inline]
    pub fn keyframe_phase(&self) -> f32 {
        self.keyframe_phase
    }

    #[inline]
    pub fn clip_time(&self) -> f32 {
        self.clip_time
    }

    #[inline]
    pub fn clip_phase(&self) -> f32 {
        self.clip_phase
    }

    #[inline]
    pub fn play_direction(&self) -> PlayDirection {
        self.direction
    }

    #[inline]
    pub fn forward_action(&self) -> BoundaryAction {
        self.forward_action
    }

    #[inline]
    pub fn reverse_action(&self) -> BoundaryAction {
        self.reverse_action
    }

    #[inline]
    pub fn crossing_limit(&self) -> usize {
        self.max_boundary_crossings
    }
}

/// Reduce a bounce overshoot by whole there-and-back cycles. A far edge that
/// stops must still be reached, so nothing is dropped in that case.
fn bounce_overshoot(far_edge: BoundaryAction, overshoot: f32, total: f32) -> f32 {
    match far_edge {
        BoundaryAction::Stop => overshoot,
        BoundaryAction::Loop | BoundaryAction::PingPong => overshoot % (2.0 * total),
    }
}

impl fmt::Display for ClipController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.clip_index {
            None => write!(f, "{}: unbound", self.name),
            Some(clip) => write!(
                f,
                "{}: clip {} keyframe {} (pool {}) t={:.3} phase={:.3} clip t={:.3} phase={:.3} {}",
                self.name,
                clip,
                self.keyframe_offset,
                self.keyframe_index,
                self.keyframe_time,
                self.keyframe_phase,
                self.clip_time,
                self.clip_phase,
                self.direction,
            ),
        }
    }
}
