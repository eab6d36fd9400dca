//! Clips: named ranges of a keyframe pool with an aggregate duration.
//!
//! A clip does not own its keyframes. It records the first pool index and a
//! count; every operation that needs durations takes the pool explicitly.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SkeletonError;
use crate::keyframe::{Keyframe, KeyframePool};
use crate::names::bounded_name;

const DEFAULT_CLIP_NAME: &str = "unnamed clip";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    name: String,
    index: usize,
    first_keyframe: usize,
    keyframe_count: usize,
    duration: f32,
    inverse_duration: f32,
    /// Normalized start phase of each keyframe; empty until distributed.
    keyframe_start_times: Vec<f32>,
}

impl Clip {
    /// Bind the clip to keyframes `first..=last` of `pool` and sum their
    /// durations. Returns the keyframe count.
    pub fn init(
        &mut self,
        name: &str,
        pool: &KeyframePool,
        first: usize,
        last: usize,
    ) -> Result<usize, SkeletonError> {
        if !pool.is_initialized() {
            return Err(SkeletonError::NotInitialized {
                what: "keyframe pool",
            });
        }
        let count = pool.len();
        if first >= count || last < first || last >= count {
            return Err(SkeletonError::InvalidRange { first, last, count });
        }

        self.name = bounded_name(name, DEFAULT_CLIP_NAME);
        self.first_keyframe = first;
        self.keyframe_count = last - first + 1;
        self.keyframe_start_times.clear();
        self.calculate_duration(pool)?;
        Ok(self.keyframe_count)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.keyframe_count > 0
    }

    #[inline]
    pub fn first_keyframe(&self) -> usize {
        self.first_keyframe
    }

    #[inline]
    pub fn keyframe_count(&self) -> usize {
        self.keyframe_count
    }

    /// Pool index of the clip's last keyframe.
    #[inline]
    pub fn final_keyframe(&self) -> usize {
        (self.first_keyframe + self.keyframe_count).saturating_sub(1)
    }

    #[inline]
    pub fn keyframe_range(&self) -> Range<usize> {
        self.first_keyframe..self.first_keyframe + self.keyframe_count
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn inverse_duration(&self) -> f32 {
        self.inverse_duration
    }

    #[inline]
    pub fn keyframe_start_times(&self) -> &[f32] {
        &self.keyframe_start_times
    }

    /// Pool index of the `offset`-th keyframe of the clip.
    pub fn keyframe_index(&self, offset: usize) -> Result<usize, SkeletonError> {
        if offset >= self.keyframe_count {
            return Err(SkeletonError::IndexOutOfRange {
                what: "keyframe in clip",
                index: offset,
                count: self.keyframe_count,
            });
        }
        Ok(self.first_keyframe + offset)
    }

    /// The clip's keyframes, checked against the pool bounds.
    pub(crate) fn keyframes<'p>(
        &self,
        pool: &'p KeyframePool,
    ) -> Result<&'p [Keyframe], SkeletonError> {
        if !self.is_initialized() {
            return Err(SkeletonError::NotInitialized { what: "clip" });
        }
        pool.as_slice()
            .get(self.keyframe_range())
            .ok_or(SkeletonError::InvalidRange {
                first: self.first_keyframe,
                last: self.final_keyframe(),
                count: pool.len(),
            })
    }

    /// Re-sum the keyframe durations. Call after editing any of them.
    pub fn calculate_duration(&mut self, pool: &KeyframePool) -> Result<f32, SkeletonError> {
        let duration: f32 = self.keyframes(pool)?.iter().map(Keyframe::duration).sum();
        self.duration = duration;
        self.inverse_duration = if duration > pool.duration_epsilon() {
            duration.recip()
        } else {
            0.0
        };
        Ok(duration)
    }

    /// Scale every keyframe so the clip lasts `new_duration`, keeping the
    /// relative timing between keyframes. No keyframe changes unless every
    /// scaled duration is valid.
    pub fn distribute_duration(
        &mut self,
        pool: &mut KeyframePool,
        new_duration: f32,
    ) -> Result<f32, SkeletonError> {
        if !new_duration.is_finite() || new_duration < 0.0 {
            return Err(SkeletonError::InvalidTime {
                time: f64::from(new_duration),
            });
        }
        let current = self.calculate_duration(pool)?;
        let epsilon = pool.duration_epsilon();
        if current <= epsilon {
            return Err(SkeletonError::DegenerateTiming {
                reason: format!("clip '{}' has zero duration and cannot be rescaled", self.name),
            });
        }

        let scale = new_duration / current;
        let scaled: Vec<f32> = self
            .keyframes(pool)?
            .iter()
            .map(|k| k.duration() * scale)
            .collect();
        if let Some(bad) = scaled.iter().find(|d| !d.is_finite()) {
            return Err(SkeletonError::InvalidTime {
                time: f64::from(*bad),
            });
        }
        for (index, duration) in self.keyframe_range().zip(scaled) {
            if let Some(keyframe) = pool.get_mut(index) {
                keyframe.set_duration(duration, epsilon)?;
            }
        }
        self.calculate_duration(pool)
    }

    /// Fill the normalized start phase of every keyframe (running sum of
    /// preceding durations over the clip duration).
    pub fn distribute_keyframe_times(
        &mut self,
        pool: &KeyframePool,
    ) -> Result<&[f32], SkeletonError> {
        let duration = self.calculate_duration(pool)?;
        if duration <= pool.duration_epsilon() {
            return Err(SkeletonError::DegenerateTiming {
                reason: format!("clip '{}' has zero duration", self.name),
            });
        }

        let mut start = 0.0_f32;
        let phases: Vec<f32> = self
            .keyframes(pool)?
            .iter()
            .map(|k| {
                let phase = start / duration;
                start += k.duration();
                phase
            })
            .collect();
        self.keyframe_start_times = phases;
        Ok(self.keyframe_start_times.as_slice())
    }

    /// Locate clip time `clip_time` (seconds from the clip start). Returns the
    /// keyframe offset within the clip and the local time inside it.
    pub fn keyframe_at_time(
        &self,
        pool: &KeyframePool,
        clip_time: f32,
    ) -> Result<(usize, f32), SkeletonError> {
        let keyframes = self.keyframes(pool)?;
        if !clip_time.is_finite() || clip_time < 0.0 || clip_time > self.duration {
            return Err(SkeletonError::InvalidTime {
                time: f64::from(clip_time),
            });
        }

        let last = keyframes.len() - 1;
        let mut start = 0.0_f32;
        for (offset, keyframe) in keyframes.iter().enumerate() {
            let end = start + keyframe.duration();
            if clip_time < end || offset == last {
                return Ok((offset, (clip_time - start).clamp(0.0, keyframe.duration())));
            }
            start = end;
        }
        Ok((last, keyframes[last].duration()))
    }

    /// Seconds from the clip start to the start of keyframe `offset`.
    pub(crate) fn keyframe_start(keyframes: &[Keyframe], offset: usize) -> f32 {
        keyframes.iter().take(offset).map(Keyframe::duration).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipPool {
    clips: Box<[Clip]>,
}

impl ClipPool {
    pub fn new(count: usize) -> Result<Self, SkeletonError> {
        let mut pool = Self::default();
        pool.create(count)?;
        Ok(pool)
    }

    pub fn create(&mut self, count: usize) -> Result<usize, SkeletonError> {
        if self.is_initialized() {
            return Err(SkeletonError::AlreadyInitialized { what: "clip pool" });
        }
        if count == 0 {
            return Err(SkeletonError::invalid("clip count must be greater than 0"));
        }
        self.clips = (0..count)
            .map(|index| Clip {
                index,
                ..Clip::default()
            })
            .collect();
        debug!(count, "clip pool created");
        Ok(count)
    }

    pub fn release(&mut self) -> Result<usize, SkeletonError> {
        if !self.is_initialized() {
            return Err(SkeletonError::NotInitialized { what: "clip pool" });
        }
        let count = self.len();
        self.clips = Box::default();
        debug!(count, "clip pool released");
        Ok(count)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        !self.clips.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Clip> {
        self.clips.get_mut(index)
    }

    pub fn clip(&self, index: usize) -> Result<&Clip, SkeletonError> {
        let count = self.len();
        self.clips.get(index).ok_or(SkeletonError::IndexOutOfRange {
            what: "clip",
            index,
            count,
        })
    }

    pub fn clip_mut(&mut self, index: usize) -> Result<&mut Clip, SkeletonError> {
        let count = self.len();
        self.clips.get_mut(index).ok_or(SkeletonError::IndexOutOfRange {
            what: "clip",
            index,
            count,
        })
    }

    /// Initialize clip `index` over keyframes `first..=last` of `keyframes`.
    pub fn init_clip(
        &mut self,
        index: usize,
        name: &str,
        keyframes: &KeyframePool,
        first: usize,
        last: usize,
    ) -> Result<usize, SkeletonError> {
        self.clip_mut(index)?.init(name, keyframes, first, last)
    }

    /// First clip whose name matches exactly. The query is bounded the way
    /// [`Clip::init`] bounds names, so an empty or over-long query finds the
    /// clip that was initialized with it.
    pub fn clip_index(&self, name: &str) -> Option<usize> {
        let name = bounded_name(name, DEFAULT_CLIP_NAME);
        self.clips.iter().position(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }
}
