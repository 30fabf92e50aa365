//! Audio block abstractions shared by every processor
//!
//! This module defines the process contract (sample rate, maximum block size,
//! channel count), the in-place multichannel buffer the host hands to the
//! engines, and the error type for the non-realtime parts of the lifecycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur outside the audio callback
///
/// The per-block hot path never produces these; it reports a
/// [`ProcessStatus`](crate::domain::dsp::ProcessStatus) instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Sample rate, block size or channel count cannot be used
    #[error("Invalid process spec: {0}")]
    InvalidSpec(String),

    /// Invalid configuration for a module or chain
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Parameter id is not registered in the store
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Parameter id was registered twice
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// Slot index does not exist in the chain
    #[error("Slot out of range: {0}")]
    SlotOutOfRange(usize),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Audio sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz96000,
    Hz192000,
    Custom(u32),
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz96000 => 96000,
            SampleRate::Hz192000 => 192000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            96000 => SampleRate::Hz96000,
            192000 => SampleRate::Hz192000,
            hz => SampleRate::Custom(hz),
        }
    }

    /// Sample rate as a float, for coefficient math
    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.hz() as f32
    }
}

/// Processing contract handed to `prepare`
///
/// `channels` is the number of input channels the processor consumes. Any
/// extra channels present in a buffer at process time are treated as
/// output-only and cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub sample_rate: SampleRate,
    pub max_block_size: usize,
    pub channels: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: u32, max_block_size: usize, channels: usize) -> Self {
        Self {
            sample_rate: SampleRate::from_hz(sample_rate),
            max_block_size,
            channels,
        }
    }

    /// Reject specs no processor can be prepared with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate.hz() == 0 {
            return Err(EngineError::InvalidSpec("sample rate must be positive".to_string()));
        }
        if self.max_block_size == 0 {
            return Err(EngineError::InvalidSpec("block size must be positive".to_string()));
        }
        if self.channels == 0 {
            return Err(EngineError::InvalidSpec("at least one channel is required".to_string()));
        }
        Ok(())
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            max_block_size: 512,
            channels: 2,
        }
    }
}

/// Non-interleaved multichannel buffer processed in place
///
/// Storage is allocated once; [`set_num_samples`](Self::set_num_samples)
/// changes the active block length without reallocating as long as it stays
/// within the capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    num_samples: usize,
}

impl AudioBuffer {
    /// Create a silent buffer of `num_channels` x `num_samples`
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_samples]; num_channels],
            num_samples,
        }
    }

    /// Wrap existing channel data; the block length is the shortest channel
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Self {
        let num_samples = channels.iter().map(Vec::len).min().unwrap_or(0);
        Self {
            channels,
            num_samples,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Change the active block length, clamped to the allocated capacity
    pub fn set_num_samples(&mut self, num_samples: usize) {
        let capacity = self.channels.iter().map(Vec::len).min().unwrap_or(0);
        self.num_samples = num_samples.min(capacity);
    }

    /// Active samples of one channel
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel][..self.num_samples]
    }

    /// Active samples of one channel, mutable
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let n = self.num_samples;
        &mut self.channels[channel][..n]
    }

    #[inline]
    pub fn sample(&self, channel: usize, index: usize) -> f32 {
        self.channels[channel][index]
    }

    #[inline]
    pub fn set_sample(&mut self, channel: usize, index: usize, value: f32) {
        self.channels[channel][index] = value;
    }

    /// Zero every channel from `first` upward
    pub fn clear_channels_from(&mut self, first: usize) {
        let n = self.num_samples;
        for channel in self.channels.iter_mut().skip(first) {
            channel[..n].fill(0.0);
        }
    }

    /// Zero the active region of all channels
    pub fn clear(&mut self) {
        self.clear_channels_from(0);
    }

    /// Copy the active region of `other` into this buffer
    ///
    /// Copies as many channels and samples as both buffers have in common.
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        let n = self.num_samples.min(other.num_samples);
        for (dst, src) in self.channels.iter_mut().zip(other.channels.iter()) {
            dst[..n].copy_from_slice(&src[..n]);
        }
    }

    /// Largest absolute sample value across all active channels
    pub fn peak(&self) -> f32 {
        (0..self.num_channels())
            .flat_map(|ch| self.channel(ch).iter())
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }
}

/// Convert decibels to a linear gain factor
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear gain factor to decibels
///
/// `floor` is added to the gain before the logarithm so silence maps to a
/// finite level.
#[inline]
pub fn gain_to_db(gain: f32, floor: f32) -> f32 {
    20.0 * (gain + floor).log10()
}
