//! Modulation sources: low-frequency oscillators and noise
//!
//! Both generators are advanced exactly once per sample by their owner and
//! the value is shared by every channel of that sample.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
    SampleAndHold,
}

/// Phase-accumulator LFO with output in [-1, 1]
#[derive(Debug, Clone)]
pub struct Lfo {
    waveform: Waveform,
    frequency_hz: f32,
    sample_rate: f32,
    phase: f32,
    increment: f32,
    held: f32,
    rng: SmallRng,
}

impl Lfo {
    pub fn new(waveform: Waveform, frequency_hz: f32) -> Self {
        let mut lfo = Self {
            waveform,
            frequency_hz,
            sample_rate: 44100.0,
            phase: 0.0,
            increment: 0.0,
            held: 0.0,
            rng: SmallRng::seed_from_u64(0x5eed_1f0),
        };
        lfo.update_increment();
        lfo
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_increment();
        self.reset();
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.frequency_hz = frequency_hz.max(0.0);
        self.update_increment();
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    fn update_increment(&mut self) {
        self.increment = if self.sample_rate > 0.0 {
            self.frequency_hz / self.sample_rate
        } else {
            0.0
        };
    }

    /// Rewind to phase zero
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.held = 0.0;
    }

    /// Output at the current phase, then advance one sample
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        let p = self.phase;
        let value = match self.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Triangle => {
                if p < 0.5 {
                    4.0 * p - 1.0
                } else {
                    3.0 - 4.0 * p
                }
            }
            Waveform::Saw => 2.0 * p - 1.0,
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::SampleAndHold => {
                if p == 0.0 {
                    self.held = self.rng.gen::<f32>() * 2.0 - 1.0;
                }
                self.held
            }
        };

        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
            if self.waveform == Waveform::SampleAndHold {
                self.held = self.rng.gen::<f32>() * 2.0 - 1.0;
            }
        }

        value
    }
}

/// Spectrum of the noise source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
}

/// White or pink noise in roughly [-1, 1]
///
/// Pink noise uses Paul Kellet's refined filter over white noise.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    color: NoiseColor,
    rng: SmallRng,
    pink: [f32; 7],
}

impl NoiseGenerator {
    const PINK_OUTPUT_GAIN: f32 = 0.11;

    /// Noise seeded from the operating system
    pub fn new(color: NoiseColor) -> Self {
        Self {
            color,
            rng: SmallRng::from_entropy(),
            pink: [0.0; 7],
        }
    }

    /// Deterministic noise for reproducible renders and tests
    pub fn with_seed(color: NoiseColor, seed: u64) -> Self {
        Self {
            color,
            rng: SmallRng::seed_from_u64(seed),
            pink: [0.0; 7],
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    /// Clear the pink filter state; the random sequence continues
    pub fn reset(&mut self) {
        self.pink = [0.0; 7];
    }

    #[inline]
    pub fn next_value(&mut self) -> f32 {
        let white = self.rng.gen::<f32>() * 2.0 - 1.0;
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => self.pink_sample(white),
        }
    }

    #[inline]
    fn pink_sample(&mut self, white: f32) -> f32 {
        let b = &mut self.pink;
        b[0] = 0.99886 * b[0] + white * 0.055_517_9;
        b[1] = 0.99332 * b[1] + white * 0.075_075_9;
        b[2] = 0.96900 * b[2] + white * 0.153_852;
        b[3] = 0.86650 * b[3] + white * 0.310_485_6;
        b[4] = 0.55000 * b[4] + white * 0.532_952_2;
        b[5] = -0.7616 * b[5] - white * 0.016_898;
        let pink = b.iter().sum::<f32>() + white * 0.5362;
        b[6] = white * 0.115_926;
        pink * Self::PINK_OUTPUT_GAIN
    }
}
