//! Spectral-flux transient detector
//!
//! Flux is the sum of magnitude increases between consecutive frames. It is
//! scaled into [0, 1] and smoothed over 20 ms.

use crate::domain::analysis::stft::StftFrame;
use crate::domain::analysis::Analyzer;
use crate::domain::audio::ProcessSpec;
use crate::domain::dsp::smoothing::LinearSmoother;

#[derive(Debug)]
pub struct TransientDetector {
    frame: StftFrame,
    previous: Vec<f32>,
    strength: LinearSmoother,
}

impl TransientDetector {
    pub const SMOOTHING_SEC: f32 = 0.02;
    /// Flux mapped to full strength
    pub const FLUX_SCALE: f32 = 5.0;

    pub fn new() -> Self {
        Self {
            frame: StftFrame::new(),
            previous: vec![0.0; StftFrame::BINS],
            strength: LinearSmoother::new(0.0),
        }
    }

    fn update_target(&mut self) {
        let mut flux = 0.0;
        for (prev, &mag) in self.previous.iter_mut().zip(self.frame.magnitudes()) {
            flux += (mag - *prev).max(0.0);
            *prev = mag;
        }
        self.strength
            .set_target((flux / Self::FLUX_SCALE).clamp(0.0, 1.0));
    }
}

impl Default for TransientDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for TransientDetector {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.strength
            .set_ramp_time(spec.sample_rate.as_f32(), Self::SMOOTHING_SEC);
        self.reset();
    }

    fn reset(&mut self) {
        self.frame.reset();
        self.previous.fill(0.0);
        self.strength.set_current_and_target(0.0);
    }

    #[inline]
    fn process_sample(&mut self, sample: f32) {
        if self.frame.push(sample) {
            self.update_target();
        }
        self.strength.next_value();
    }

    fn current_value(&self) -> f32 {
        self.strength.current()
    }

    fn latency_samples(&self) -> usize {
        StftFrame::HOP
    }
}
