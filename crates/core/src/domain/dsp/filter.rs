//! Topology-preserving-transform state variable low-pass
//!
//! Used as the in-loop tone control of the tape delay. Coefficients are
//! shared by all channels; each channel keeps its own two integrator states,
//! so changing the cutoff mid-stream does not click.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SvfState {
    s1: f32,
    s2: f32,
}

/// Multichannel state variable low-pass with Butterworth damping
#[derive(Debug, Clone, PartialEq)]
pub struct StateVariableFilter {
    sample_rate: f32,
    cutoff_hz: f32,
    // Pre-computed coefficients
    g: f32,
    r2: f32,
    h: f32,
    states: Vec<SvfState>,
}

impl StateVariableFilter {
    /// Lowest cutoff accepted
    pub const MIN_CUTOFF_HZ: f32 = 20.0;
    /// Highest cutoff as a fraction of the sample rate
    pub const MAX_CUTOFF_RATIO: f32 = 0.49;
    /// Butterworth resonance, no peak at the cutoff
    pub const RESONANCE: f32 = std::f32::consts::FRAC_1_SQRT_2;

    pub fn new() -> Self {
        let mut filter = Self {
            sample_rate: 44100.0,
            cutoff_hz: 1000.0,
            g: 0.0,
            r2: 0.0,
            h: 0.0,
            states: Vec::new(),
        };
        filter.update_coefficients();
        filter
    }

    /// Allocate state for `channels` and derive coefficients for the rate
    pub fn prepare(&mut self, sample_rate: f32, channels: usize) {
        self.sample_rate = sample_rate;
        self.states = vec![SvfState::default(); channels];
        self.update_coefficients();
    }

    /// Set the cutoff, clamped to [20 Hz, 0.49 * sample rate]
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        let max = self.sample_rate * Self::MAX_CUTOFF_RATIO;
        let clamped = cutoff_hz.clamp(Self::MIN_CUTOFF_HZ, max.max(Self::MIN_CUTOFF_HZ));
        if clamped != self.cutoff_hz {
            self.cutoff_hz = clamped;
            self.update_coefficients();
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    fn update_coefficients(&mut self) {
        self.g = (PI * self.cutoff_hz / self.sample_rate).tan();
        self.r2 = 1.0 / Self::RESONANCE;
        self.h = 1.0 / (1.0 + self.r2 * self.g + self.g * self.g);
    }

    /// Filter one sample of `channel`
    ///
    /// Channels beyond the prepared count pass through.
    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f32 {
        let Some(state) = self.states.get_mut(channel) else {
            return x;
        };

        let hp = self.h * (x - state.s1 * (self.g + self.r2) - state.s2);
        let bp = hp * self.g + state.s1;
        state.s1 = hp * self.g + bp;
        let lp = bp * self.g + state.s2;
        state.s2 = bp * self.g + lp;
        lp
    }

    /// Clear integrator state on every channel
    pub fn reset(&mut self) {
        self.states.fill(SvfState::default());
    }
}

impl Default for StateVariableFilter {
    fn default() -> Self {
        Self::new()
    }
}
