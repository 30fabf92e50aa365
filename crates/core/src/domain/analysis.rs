//! Real-time signal analysis feeding the morph controller
//!
//! Analyzers consume one mono sample at a time and expose a smoothed
//! control value in [0, 1]. They report a fixed latency (one STFT hop) that
//! is read once after `prepare`.

pub mod spectral;
pub mod stft;
pub mod transient;

pub use spectral::SpectralAnalyzer;
pub use stft::StftFrame;
pub use transient::TransientDetector;

use crate::domain::audio::ProcessSpec;

/// Sample-by-sample analysis producing one control value
pub trait Analyzer: Send {
    /// Allocate and derive smoothing for the sample rate, then reset
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Clear history and return to the neutral value
    fn reset(&mut self);

    /// Feed one sample; also advances the output smoothing by one step
    fn process_sample(&mut self, sample: f32);

    /// Smoothed output in [0, 1]
    fn current_value(&self) -> f32;

    /// Delay between input and the analysis reacting to it
    fn latency_samples(&self) -> usize {
        0
    }
}
