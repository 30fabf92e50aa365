//! Overlapping short-time Fourier frames
//!
//! Samples are pushed one at a time into a FIFO. Once it holds a full frame
//! the frame is windowed and transformed, and the FIFO shifts by one hop.
//! All buffers and the FFT plan are allocated up front.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub struct StftFrame {
    fifo: Vec<f32>,
    fill: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl StftFrame {
    pub const SIZE: usize = 512;
    pub const HOP: usize = 256;
    /// Bins from DC to Nyquist inclusive
    pub const BINS: usize = Self::SIZE / 2 + 1;

    pub fn new() -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(Self::SIZE);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        // Symmetric Hann
        let denom = (Self::SIZE - 1) as f32;
        let window = (0..Self::SIZE)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
            .collect();

        Self {
            fifo: vec![0.0; Self::SIZE],
            fill: 0,
            window,
            fft,
            spectrum: vec![Complex::new(0.0, 0.0); Self::SIZE],
            scratch,
            magnitudes: vec![0.0; Self::BINS],
        }
    }

    pub fn reset(&mut self) {
        self.fifo.fill(0.0);
        self.fill = 0;
        self.magnitudes.fill(0.0);
    }

    /// Push one sample; returns true when a new frame was analysed
    #[inline]
    pub fn push(&mut self, sample: f32) -> bool {
        self.fifo[self.fill] = sample;
        self.fill += 1;

        if self.fill < Self::SIZE {
            return false;
        }

        self.analyze();
        self.fifo.copy_within(Self::HOP.., 0);
        self.fill = Self::SIZE - Self::HOP;
        true
    }

    fn analyze(&mut self) {
        for ((bin, &x), &w) in self.spectrum.iter_mut().zip(&self.fifo).zip(&self.window) {
            *bin = Complex::new(x * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *mag = bin.norm();
        }
    }

    /// Magnitudes of the latest frame, DC to Nyquist
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Centre frequency of a bin
    #[inline]
    pub fn bin_hz(bin: usize, sample_rate: f32) -> f32 {
        bin as f32 * sample_rate / Self::SIZE as f32
    }
}

impl Default for StftFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StftFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StftFrame")
            .field("size", &Self::SIZE)
            .field("hop", &Self::HOP)
            .field("fill", &self.fill)
            .finish()
    }
}
