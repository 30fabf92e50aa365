//! Spectral centroid tracker
//!
//! Reports the magnitude-weighted mean frequency of the input, normalized
//! to Nyquist and smoothed over 30 ms. Silence leaves the last value in
//! place; a fresh analyzer starts at the neutral 0.5.

use crate::domain::analysis::stft::StftFrame;
use crate::domain::analysis::Analyzer;
use crate::domain::audio::ProcessSpec;
use crate::domain::dsp::smoothing::LinearSmoother;

#[derive(Debug)]
pub struct SpectralAnalyzer {
    frame: StftFrame,
    sample_rate: f32,
    centroid: LinearSmoother,
}

impl SpectralAnalyzer {
    pub const SMOOTHING_SEC: f32 = 0.03;
    pub const NEUTRAL: f32 = 0.5;
    const SILENCE: f32 = 1e-6;

    pub fn new() -> Self {
        Self {
            frame: StftFrame::new(),
            sample_rate: 44100.0,
            centroid: LinearSmoother::new(Self::NEUTRAL),
        }
    }

    fn update_target(&mut self) {
        let nyquist = self.sample_rate * 0.5;
        let mut weighted = 0.0;
        let mut total = 0.0;

        // Skip DC
        for (bin, &mag) in self.frame.magnitudes().iter().enumerate().skip(1) {
            weighted += mag * StftFrame::bin_hz(bin, self.sample_rate);
            total += mag;
        }

        if total > Self::SILENCE {
            let centroid = weighted / total / nyquist;
            self.centroid.set_target(centroid.clamp(0.0, 1.0));
        }
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for SpectralAnalyzer {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate.as_f32();
        self.centroid.set_ramp_time(self.sample_rate, Self::SMOOTHING_SEC);
        self.reset();
    }

    fn reset(&mut self) {
        self.frame.reset();
        self.centroid.set_current_and_target(Self::NEUTRAL);
    }

    #[inline]
    fn process_sample(&mut self, sample: f32) {
        if self.frame.push(sample) {
            self.update_target();
        }
        self.centroid.next_value();
    }

    fn current_value(&self) -> f32 {
        self.centroid.current()
    }

    fn latency_samples(&self) -> usize {
        StftFrame::HOP
    }
}
