//! Digital signal processing engines and primitives
//!
//! This module provides:
//! - Dynamics engine with peak/RMS detection and topology coloration
//! - Tape-style modulated feedback delay
//! - Morphing compressor driven by input analysis
//!
//! Everything that runs per block is designed for:
//! - Zero allocations in the hot path (buffers are sized in `prepare`)
//! - No locks; control values arrive through atomic cells
//! - In-place processing of non-interleaved buffers

pub mod delay_line;
pub mod dynamics;
pub mod filter;
pub mod modulation;
pub mod morph;
pub mod smoothing;
pub mod tape_delay;

use crate::domain::audio::{AudioBuffer, ProcessSpec, Result};

/// Outcome of one `process` call
///
/// The hot path never fails; when controls are missing the block is left
/// untouched and the caller is told so.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The block was processed in place
    Processed,
    /// The processor is bypassed; the block was not touched
    Bypassed,
    /// A required control is not registered; the block was not touched
    ParametersNotReady,
}

/// Uniform lifecycle shared by every effect module
pub trait Processor: Send {
    /// Allocate buffers and derive coefficients for a process contract
    ///
    /// Runs off the audio thread and must not race with `process`.
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()>;

    /// Clear internal state without deallocating
    fn reset(&mut self);

    /// Process a block in place
    ///
    /// # Requirements
    /// - No allocations, locks or blocking
    /// - Handle any block length up to the prepared maximum
    /// - Zero channels beyond the prepared input count
    fn process(&mut self, buffer: &mut AudioBuffer) -> ProcessStatus;

    /// Latency introduced by the processor, fixed after `prepare`
    fn latency_samples(&self) -> usize {
        0
    }

    /// How long the output may keep ringing after the input stops
    fn tail_seconds(&self) -> f32 {
        0.0
    }

    /// Check if the processor is bypassed
    fn is_bypassed(&self) -> bool;

    /// Toggle bypass state
    fn set_bypass(&mut self, bypass: bool);

    /// Name for logging and display
    fn name(&self) -> &str;
}

/// Ranges every engine clamps its settings to
pub mod limits {
    /// Threshold range in dB
    pub const DB_MIN: f32 = -60.0;
    pub const DB_MAX: f32 = 0.0;

    /// Compression ratio range (1:1 to 20:1)
    pub const RATIO_MIN: f32 = 1.0;
    pub const RATIO_MAX: f32 = 20.0;

    /// Envelope attack range in milliseconds
    pub const ATTACK_MS_MIN: f32 = 0.1;
    pub const ATTACK_MS_MAX: f32 = 500.0;

    /// Envelope release range in milliseconds
    pub const RELEASE_MS_MIN: f32 = 5.0;
    pub const RELEASE_MS_MAX: f32 = 2000.0;

    /// Makeup gain range in dB
    pub const MAKEUP_DB_MIN: f32 = 0.0;
    pub const MAKEUP_DB_MAX: f32 = 24.0;
}
