//! Keyframes and the fixed-size pool that owns them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::SkeletonError;

/// Opaque reference to data sampled at a keyframe, such as a key pose index
/// or a sprite cell. Resolved outside this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRef(pub u32);

impl From<u32> for SampleRef {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    index: usize,
    duration: f32,
    inverse_duration: f32,
    sample: SampleRef,
}

impl Keyframe {
    /// Set duration and sample. Returns the keyframe's pool index.
    pub(crate) fn init(
        &mut self,
        duration: f32,
        sample: SampleRef,
        epsilon: f32,
    ) -> Result<usize, SkeletonError> {
        self.set_duration(duration, epsilon)?;
        self.sample = sample;
        Ok(self.index)
    }

    /// Zero duration is allowed. Durations at or below `epsilon` store a
    /// zero reciprocal.
    pub(crate) fn set_duration(&mut self, duration: f32, epsilon: f32) -> Result<(), SkeletonError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SkeletonError::InvalidTime {
                time: f64::from(duration),
            });
        }
        self.duration = duration;
        self.update_inverse(epsilon);
        Ok(())
    }

    fn update_inverse(&mut self, epsilon: f32) {
        self.inverse_duration = if self.duration > epsilon {
            self.duration.recip()
        } else {
            0.0
        };
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
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
    pub fn sample(&self) -> SampleRef {
        self.sample
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframePool {
    keyframes: Box<[Keyframe]>,
    /// Durations at or below this count as zero for the pool and its clips.
    #[serde(default = "default_duration_epsilon")]
    duration_epsilon: f32,
}

fn default_duration_epsilon() -> f32 {
    Config::default().duration_epsilon
}

impl Default for KeyframePool {
    fn default() -> Self {
        Self {
            keyframes: Box::default(),
            duration_epsilon: default_duration_epsilon(),
        }
    }
}

impl KeyframePool {
    pub fn new(count: usize) -> Result<Self, SkeletonError> {
        let mut pool = Self::default();
        pool.create(count)?;
        Ok(pool)
    }

    /// Allocate `count` zero-duration keyframes, each indexed by position.
    pub fn create(&mut self, count: usize) -> Result<usize, SkeletonError> {
        if self.is_initialized() {
            return Err(SkeletonError::AlreadyInitialized {
                what: "keyframe pool",
            });
        }
        if count == 0 {
            return Err(SkeletonError::invalid("keyframe count must be greater than 0"));
        }
        self.keyframes = (0..count)
            .map(|index| Keyframe {
                index,
                ..Keyframe::default()
            })
            .collect();
        debug!(count, "keyframe pool created");
        Ok(count)
    }

    /// Take the zero-duration threshold from `config`, refreshing the
    /// reciprocals of keyframes already set.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.duration_epsilon = config.duration_epsilon;
        for keyframe in self.keyframes.iter_mut() {
            keyframe.update_inverse(config.duration_epsilon);
        }
        self
    }

    #[inline]
    pub fn duration_epsilon(&self) -> f32 {
        self.duration_epsilon
    }

    pub fn release(&mut self) -> Result<usize, SkeletonError> {
        if !self.is_initialized() {
            return Err(SkeletonError::NotInitialized {
                what: "keyframe pool",
            });
        }
        let count = self.len();
        self.keyframes = Box::default();
        debug!(count, "keyframe pool released");
        Ok(count)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        !self.keyframes.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Keyframe> {
        self.keyframes.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Keyframe> {
        self.keyframes.get_mut(index)
    }

    /// Like [`get`](Self::get) but reports the miss as an error.
    pub fn keyframe(&self, index: usize) -> Result<&Keyframe, SkeletonError> {
        let count = self.len();
        self.keyframes.get(index).ok_or(SkeletonError::IndexOutOfRange {
            what: "keyframe",
            index,
            count,
        })
    }

    pub fn init_keyframe(
        &mut self,
        index: usize,
        duration: f32,
        sample: SampleRef,
    ) -> Result<usize, SkeletonError> {
        let count = self.len();
        let epsilon = self.duration_epsilon;
        self.keyframes
            .get_mut(index)
            .ok_or(SkeletonError::IndexOutOfRange {
                what: "keyframe",
                index,
                count,
            })?
            .init(duration, sample, epsilon)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.iter()
    }

    pub(crate) fn as_slice(&self) -> &[Keyframe] {
        &self.keyframes
    }
}
