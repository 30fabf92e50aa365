//! Tape-style modulated feedback delay
//!
//! Signal path per sample and channel, in this order:
//!
//! ```text
//! read(delay) -> tanh(1.5x) * 0.9 -> low-pass(color) -> write(in + wet * fb)
//! out = in * (1 - mix) + wet * mix
//! ```
//!
//! The delay time is a smoothed base time plus wow (sine), flutter
//! (triangle) and pink noise scaled by the tape age. Modulation is computed
//! once per sample and shared by all channels.

use crate::domain::audio::{AudioBuffer, ProcessSpec};
use crate::domain::dsp::delay_line::DelayLine;
use crate::domain::dsp::dynamics::Curve;
use crate::domain::dsp::filter::StateVariableFilter;
use crate::domain::dsp::modulation::{Lfo, NoiseColor, NoiseGenerator, Waveform};
use crate::domain::dsp::smoothing::LinearSmoother;
use tracing::debug;

/// Delay circuit being emulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayMode {
    #[default]
    Tape,
    /// Bucket-brigade; currently shares the tape path
    Bbd,
    /// Clean placeholder: audio passes through unmodified
    Digital,
}

impl DelayMode {
    pub fn from_index(value: f32) -> Self {
        match value.round() as i32 {
            1 => DelayMode::Bbd,
            2 => DelayMode::Digital,
            _ => DelayMode::Tape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySettings {
    pub mode: DelayMode,
    pub time_ms: f32,
    pub feedback: f32,
    pub mix: f32,
    /// Loop filter cutoff in Hz before age darkening
    pub color_hz: f32,
    pub wow: f32,
    pub flutter: f32,
    pub age: f32,
}

impl DelaySettings {
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.time_ms = self
            .time_ms
            .clamp(ModulatedDelay::MIN_DELAY_MS, ModulatedDelay::MAX_DELAY_SEC * 1000.0);
        self.feedback = self.feedback.clamp(0.0, 1.0);
        self.mix = self.mix.clamp(0.0, 1.0);
        self.color_hz = self.color_hz.max(StateVariableFilter::MIN_CUTOFF_HZ);
        self.wow = self.wow.clamp(0.0, 1.0);
        self.flutter = self.flutter.clamp(0.0, 1.0);
        self.age = self.age.clamp(0.0, 1.0);
        self
    }

    /// Loop filter cutoff after age darkening
    pub fn loop_cutoff_hz(&self) -> f32 {
        self.color_hz * (1.0 - self.age * ModulatedDelay::AGE_DARKENING)
    }
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            mode: DelayMode::Tape,
            time_ms: 500.0,
            feedback: 0.5,
            mix: 0.5,
            color_hz: 5000.0,
            wow: 0.2,
            flutter: 0.1,
            age: 0.5,
        }
    }
}

/// Feedback delay with in-loop saturation, filtering and pitch modulation
#[derive(Debug, Clone)]
pub struct ModulatedDelay {
    settings: DelaySettings,
    sample_rate: f32,
    channels: usize,
    line: DelayLine,
    wow: Lfo,
    flutter: Lfo,
    noise: NoiseGenerator,
    filter: StateVariableFilter,
    time: LinearSmoother,
}

impl ModulatedDelay {
    pub const MAX_DELAY_SEC: f32 = 2.0;
    pub const MIN_DELAY_MS: f32 = 1.0;
    pub const TIME_RAMP_SEC: f32 = 0.05;

    pub const WOW_HZ: f32 = 0.8;
    pub const FLUTTER_HZ: f32 = 8.0;
    pub const WOW_DEPTH_MS: f32 = 5.0;
    pub const FLUTTER_DEPTH_MS: f32 = 1.0;
    pub const NOISE_DEPTH_MS: f32 = 0.5;

    pub const SATURATION: Curve = Curve::Tanh(1.5);
    pub const SATURATION_LEVEL: f32 = 0.9;
    pub const AGE_DARKENING: f32 = 0.3;

    pub fn new(settings: DelaySettings) -> Self {
        Self::with_noise(settings, NoiseGenerator::new(NoiseColor::Pink))
    }

    /// Deterministic noise modulation, for reproducible renders
    pub fn with_noise_seed(settings: DelaySettings, seed: u64) -> Self {
        Self::with_noise(settings, NoiseGenerator::with_seed(NoiseColor::Pink, seed))
    }

    fn with_noise(settings: DelaySettings, noise: NoiseGenerator) -> Self {
        let settings = settings.sanitized();
        Self {
            settings,
            sample_rate: 44100.0,
            channels: 0,
            line: DelayLine::new(),
            wow: Lfo::new(Waveform::Sine, Self::WOW_HZ),
            flutter: Lfo::new(Waveform::Triangle, Self::FLUTTER_HZ),
            noise,
            filter: StateVariableFilter::new(),
            time: LinearSmoother::new(settings.time_ms),
        }
    }

    /// Allocate the delay buffer for the sample rate and channel count
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate.as_f32();
        self.channels = spec.channels;

        let max_samples = (Self::MAX_DELAY_SEC * self.sample_rate).ceil() as usize;
        self.line.prepare(self.channels, max_samples);
        self.wow.prepare(self.sample_rate);
        self.flutter.prepare(self.sample_rate);
        self.noise.reset();
        self.filter.prepare(self.sample_rate, self.channels);
        self.filter.set_cutoff(self.settings.loop_cutoff_hz());

        self.time.set_ramp_time(self.sample_rate, Self::TIME_RAMP_SEC);
        self.time.set_current_and_target(self.settings.time_ms);

        debug!(
            sample_rate = self.sample_rate,
            channels = self.channels,
            max_delay_samples = max_samples,
            "Tape delay prepared"
        );
    }

    /// Silence the buffer and rewind modulation; the time ramp lands on its target
    pub fn reset(&mut self) {
        self.line.clear();
        self.wow.reset();
        self.flutter.reset();
        self.noise.reset();
        self.filter.reset();
        self.time.snap_to_target();
    }

    pub fn configure(&mut self, settings: DelaySettings) {
        let settings = settings.sanitized();
        if settings == self.settings {
            return;
        }
        self.settings = settings;
        self.time.set_target(settings.time_ms);
        self.filter.set_cutoff(settings.loop_cutoff_hz());
    }

    /// Jump the delay time without ramping
    pub fn snap_time(&mut self, time_ms: f32) {
        let time_ms = time_ms.clamp(Self::MIN_DELAY_MS, self.max_delay_ms());
        self.settings.time_ms = time_ms;
        self.time.set_current_and_target(time_ms);
    }

    pub fn settings(&self) -> &DelaySettings {
        &self.settings
    }

    pub fn max_delay_ms(&self) -> f32 {
        Self::MAX_DELAY_SEC * 1000.0
    }

    /// Current smoothed base delay time in ms
    pub fn current_time_ms(&self) -> f32 {
        self.time.current()
    }

    #[inline]
    fn modulation_ms(&mut self) -> f32 {
        let wow = self.wow.next_value();
        let flutter = self.flutter.next_value();
        let noise = self.noise.next_value();
        wow * self.settings.wow * Self::WOW_DEPTH_MS
            + flutter * self.settings.flutter * Self::FLUTTER_DEPTH_MS
            + noise * self.settings.age * Self::NOISE_DEPTH_MS
    }

    /// Process the prepared channels of a buffer in place
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if self.settings.mode == DelayMode::Digital {
            return;
        }

        let channels = buffer.num_channels().min(self.channels);
        let max_delay = (self.line.max_delay_samples() as f32 - 1.0).max(1.0);
        let samples_per_ms = self.sample_rate / 1000.0;
        let DelaySettings { feedback, mix, .. } = self.settings;

        for i in 0..buffer.num_samples() {
            let base_ms = self.time.next_value();
            let delay_ms = (base_ms + self.modulation_ms()).max(Self::MIN_DELAY_MS);
            let delay_samples = (delay_ms * samples_per_ms).min(max_delay);

            for ch in 0..channels {
                let input = buffer.sample(ch, i);

                let delayed = self.line.read(ch, delay_samples);
                let saturated = Self::SATURATION.apply(delayed) * Self::SATURATION_LEVEL;
                let wet = self.filter.process_sample(ch, saturated);
                self.line.write(ch, input + wet * feedback);

                buffer.set_sample(ch, i, input * (1.0 - mix) + wet * mix);
            }
            self.line.advance();
        }
    }
}

impl Default for ModulatedDelay {
    fn default() -> Self {
        Self::new(DelaySettings::default())
    }
}
