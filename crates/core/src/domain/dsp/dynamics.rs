//! Dynamics engine: detector, gain computer, envelope and coloration
//!
//! Per sample and channel:
//!
//! ```text
//! x -> detector (peak | rms) -> dB -> hard-knee gain computer
//!   -> envelope ballistics on the gain (dB) -> coloration(x * gain) * makeup
//! ```
//!
//! The topology is a closed set mapped to a fixed profile; there is no
//! per-sample dispatch beyond a `match` on a `Copy` enum.

use crate::domain::audio::{db_to_gain, gain_to_db, AudioBuffer, ProcessSpec};
use crate::domain::dsp::smoothing::LinearSmoother;
use crate::domain::dsp::limits;
use tracing::{debug, trace};

/// Offset added before taking the log of a detector level
pub const LEVEL_FLOOR: f32 = 1e-9;

// ============================================================================
// COLORATION CURVES
// ============================================================================

/// Memoryless saturation curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Identity,
    /// `tanh(k * x)`
    Tanh(f32),
    /// `x / (|x| + k)`
    Rational(f32),
}

impl Curve {
    #[inline]
    #[must_use]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Curve::Identity => x,
            Curve::Tanh(k) => (k * x).tanh(),
            Curve::Rational(k) => x / (x.abs() + k),
        }
    }
}

// ============================================================================
// BALLISTICS
// ============================================================================

/// One-pole coefficient for a time constant: `exp(-1 / (t * sr))`
///
/// Zero or negative times give an instant response.
#[inline]
#[must_use]
pub fn time_coeff(time_sec: f32, sample_rate: f32) -> f32 {
    if time_sec <= 0.0 || sample_rate <= 0.0 {
        return 0.0;
    }
    (-1.0 / (time_sec * sample_rate)).exp()
}

/// Asymmetric attack/release smoothing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ballistics {
    attack_coeff: f32,
    release_coeff: f32,
}

impl Ballistics {
    pub fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            attack_coeff: time_coeff(attack_ms / 1000.0, sample_rate),
            release_coeff: time_coeff(release_ms / 1000.0, sample_rate),
        }
    }

    /// Follow a rising signal with the attack time, a falling one with release
    #[inline]
    pub fn follow(&self, state: f32, input: f32) -> f32 {
        let coeff = if input > state {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        coeff * state + (1.0 - coeff) * input
    }

    /// Follow a gain in dB: attack while the reduction deepens
    #[inline]
    pub fn follow_reduction(&self, state_db: f32, target_db: f32) -> f32 {
        let coeff = if target_db < state_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        coeff * state_db + (1.0 - coeff) * target_db
    }
}

/// Hard-knee reduction in dB for a detector level
#[inline]
fn hard_knee_gain_db(level_db: f32, threshold_db: f32, ratio: f32) -> f32 {
    if level_db > threshold_db {
        (threshold_db - level_db) * (1.0 - 1.0 / ratio)
    } else {
        0.0
    }
}

// ============================================================================
// TOPOLOGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Clean,
    Aggressive,
    Smooth,
}

/// Time scaling and coloration of a topology
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyProfile {
    pub attack_scale: f32,
    pub attack_floor_ms: f32,
    pub release_scale: f32,
    pub coloration: Curve,
}

impl Topology {
    /// Map a choice parameter (0, 1, 2) to a topology
    pub fn from_index(value: f32) -> Self {
        match value.round() as i32 {
            1 => Topology::Aggressive,
            2 => Topology::Smooth,
            _ => Topology::Clean,
        }
    }

    pub const fn profile(self) -> TopologyProfile {
        match self {
            Topology::Clean => TopologyProfile {
                attack_scale: 1.0,
                attack_floor_ms: 0.0,
                release_scale: 1.0,
                coloration: Curve::Identity,
            },
            Topology::Aggressive => TopologyProfile {
                attack_scale: 0.5,
                attack_floor_ms: 0.1,
                release_scale: 1.0,
                coloration: Curve::Tanh(1.5),
            },
            Topology::Smooth => TopologyProfile {
                attack_scale: 1.5,
                attack_floor_ms: 10.0,
                release_scale: 1.2,
                coloration: Curve::Tanh(0.8),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorMode {
    #[default]
    Peak,
    Rms,
}

impl DetectorMode {
    pub fn from_index(value: f32) -> Self {
        if value.round() as i32 == 1 {
            DetectorMode::Rms
        } else {
            DetectorMode::Peak
        }
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Full configuration of a [`DynamicsEngine`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsSettings {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub makeup_db: f32,
    pub topology: Topology,
    pub detector: DetectorMode,
    /// Peak detector rise time
    pub detector_attack_ms: f32,
    /// Peak detector fall time
    pub detector_release_ms: f32,
}

impl DynamicsSettings {
    pub const DEFAULT_DETECTOR_ATTACK_MS: f32 = 0.1;
    pub const DEFAULT_DETECTOR_RELEASE_MS: f32 = 5.0;
    pub const RMS_WINDOW_MS: f32 = 10.0;

    /// Copy with every value clamped into a usable range
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.threshold_db = self.threshold_db.clamp(limits::DB_MIN, limits::DB_MAX);
        self.ratio = self.ratio.clamp(limits::RATIO_MIN, limits::RATIO_MAX);
        self.attack_ms = self.attack_ms.clamp(limits::ATTACK_MS_MIN, limits::ATTACK_MS_MAX);
        self.release_ms = self
            .release_ms
            .clamp(limits::RELEASE_MS_MIN, limits::RELEASE_MS_MAX);
        self.makeup_db = self.makeup_db.clamp(limits::MAKEUP_DB_MIN, limits::MAKEUP_DB_MAX);
        self.detector_attack_ms = self.detector_attack_ms.max(0.0);
        self.detector_release_ms = self.detector_release_ms.max(0.0);
        self
    }

    /// Attack and release after topology scaling, in ms
    pub fn effective_times_ms(&self) -> (f32, f32) {
        let profile = self.topology.profile();
        let attack = (self.attack_ms * profile.attack_scale).max(profile.attack_floor_ms);
        let release = self.release_ms * profile.release_scale;
        (attack, release)
    }
}

impl Default for DynamicsSettings {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            makeup_db: 0.0,
            topology: Topology::Clean,
            detector: DetectorMode::Peak,
            detector_attack_ms: Self::DEFAULT_DETECTOR_ATTACK_MS,
            detector_release_ms: Self::DEFAULT_DETECTOR_RELEASE_MS,
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ChannelState {
    peak: f32,
    mean_square: f32,
    gain_db: f32,
}

/// Feed-forward compressor with per-channel detection
#[derive(Debug, Clone)]
pub struct DynamicsEngine {
    settings: DynamicsSettings,
    sample_rate: f32,
    channels: Vec<ChannelState>,
    detector: Ballistics,
    envelope: Ballistics,
    rms_alpha: f32,
    makeup: LinearSmoother,
    makeup_gain: f32,
}

impl DynamicsEngine {
    pub const MAKEUP_RAMP_SEC: f32 = 0.05;

    pub fn new(settings: DynamicsSettings) -> Self {
        let settings = settings.sanitized();
        let mut engine = Self {
            settings,
            sample_rate: 44100.0,
            channels: Vec::new(),
            detector: Ballistics::default(),
            envelope: Ballistics::default(),
            rms_alpha: 0.0,
            makeup: LinearSmoother::new(db_to_gain(settings.makeup_db)),
            makeup_gain: db_to_gain(settings.makeup_db),
        };
        engine.update_coefficients();
        engine
    }

    /// Allocate per-channel state and derive coefficients
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate.as_f32();
        self.channels = vec![ChannelState::default(); spec.channels];
        self.makeup.set_ramp_time(self.sample_rate, Self::MAKEUP_RAMP_SEC);
        self.makeup
            .set_current_and_target(db_to_gain(self.settings.makeup_db));
        self.makeup_gain = self.makeup.current();
        self.update_coefficients();
        debug!(
            sample_rate = self.sample_rate,
            channels = spec.channels,
            "Dynamics engine prepared"
        );
    }

    /// Zero detector and envelope state
    pub fn reset(&mut self) {
        self.channels.fill(ChannelState::default());
        self.makeup.snap_to_target();
        self.makeup_gain = self.makeup.current();
    }

    /// Apply new settings; coefficients are only recomputed when they change
    pub fn configure(&mut self, settings: DynamicsSettings) {
        let settings = settings.sanitized();
        if settings == self.settings {
            return;
        }
        let times_changed = settings.attack_ms != self.settings.attack_ms
            || settings.release_ms != self.settings.release_ms
            || settings.topology != self.settings.topology
            || settings.detector_attack_ms != self.settings.detector_attack_ms
            || settings.detector_release_ms != self.settings.detector_release_ms;

        self.settings = settings;
        self.makeup.set_target(db_to_gain(settings.makeup_db));
        if times_changed {
            self.update_coefficients();
        }
    }

    pub fn settings(&self) -> &DynamicsSettings {
        &self.settings
    }

    fn update_coefficients(&mut self) {
        let (attack_ms, release_ms) = self.settings.effective_times_ms();
        self.envelope = Ballistics::new(attack_ms, release_ms, self.sample_rate);
        self.detector = Ballistics::new(
            self.settings.detector_attack_ms,
            self.settings.detector_release_ms,
            self.sample_rate,
        );
        self.rms_alpha = time_coeff(DynamicsSettings::RMS_WINDOW_MS / 1000.0, self.sample_rate);

        trace!(
            attack_ms,
            release_ms,
            topology = ?self.settings.topology,
            "Updated dynamics coefficients"
        );
    }

    /// Static gain computer: reduction in dB (zero or negative)
    #[inline]
    pub fn compute_gain_db(&self, level_db: f32) -> f32 {
        hard_knee_gain_db(level_db, self.settings.threshold_db, self.settings.ratio)
    }

    /// Advance the makeup ramp by one sample
    ///
    /// [`process_block`](Self::process_block) calls this once per frame;
    /// callers driving [`process_sample`](Self::process_sample) directly
    /// must do the same.
    #[inline]
    pub fn tick_makeup(&mut self) {
        self.makeup_gain = self.makeup.next_value();
    }

    /// Process one sample of `channel`
    ///
    /// Channels beyond the prepared count pass through unchanged.
    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f32 {
        let detector = self.detector;
        let envelope = self.envelope;
        let rms_alpha = self.rms_alpha;
        let DynamicsSettings {
            threshold_db,
            ratio,
            detector: mode,
            topology,
            ..
        } = self.settings;

        let Some(state) = self.channels.get_mut(channel) else {
            return x;
        };

        let level = match mode {
            DetectorMode::Peak => {
                state.peak = detector.follow(state.peak, x.abs());
                state.peak
            }
            DetectorMode::Rms => {
                state.mean_square = rms_alpha * state.mean_square + (1.0 - rms_alpha) * x * x;
                state.mean_square.sqrt()
            }
        };

        let level_db = gain_to_db(level, LEVEL_FLOOR);
        let target_db = hard_knee_gain_db(level_db, threshold_db, ratio);
        state.gain_db = envelope.follow_reduction(state.gain_db, target_db);

        topology.profile().coloration.apply(x * db_to_gain(state.gain_db)) * self.makeup_gain
    }

    /// Process the first `channels` channels of a buffer in place
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        let channels = buffer.num_channels().min(self.channels.len());
        for i in 0..buffer.num_samples() {
            self.tick_makeup();
            for ch in 0..channels {
                let y = self.process_sample(ch, buffer.sample(ch, i));
                buffer.set_sample(ch, i, y);
            }
        }
    }

    /// Current smoothed gain of `channel` in dB (zero or negative)
    pub fn gain_reduction_db(&self, channel: usize) -> f32 {
        self.channels.get(channel).map_or(0.0, |s| s.gain_db)
    }

    /// Current detector output of `channel`, linear
    pub fn detector_level(&self, channel: usize) -> f32 {
        self.channels.get(channel).map_or(0.0, |s| match self.settings.detector {
            DetectorMode::Peak => s.peak,
            DetectorMode::Rms => s.mean_square.sqrt(),
        })
    }
}

impl Default for DynamicsEngine {
    fn default() -> Self {
        Self::new(DynamicsSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 48000;

    fn prepared(settings: DynamicsSettings, channels: usize) -> DynamicsEngine {
        let mut engine = DynamicsEngine::new(settings);
        engine.prepare(&ProcessSpec::new(SAMPLE_RATE, 512, channels));
        engine
    }

    fn sine(amplitude: f32, freq: f32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    // -------------------------------------------------------------------------
    // Curves and ballistics
    // -------------------------------------------------------------------------

    #[test]
    fn test_curves() {
        assert_eq!(Curve::Identity.apply(0.3), 0.3);
        assert!((Curve::Tanh(1.5).apply(0.5) - (0.75_f32).tanh()).abs() < 1e-6);
        assert!((Curve::Rational(0.7).apply(0.7) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_time_coeff() {
        assert_eq!(time_coeff(0.0, 48000.0), 0.0);
        let c = time_coeff(0.01, 48000.0);
        assert!((c - (-1.0_f32 / 480.0).exp()).abs() < 1e-7);
    }

    #[test]
    fn test_topology_profiles() {
        let mut settings = DynamicsSettings {
            attack_ms: 4.0,
            release_ms: 100.0,
            topology: Topology::Smooth,
            ..Default::default()
        };
        let (attack, release) = settings.effective_times_ms();
        assert_eq!(attack, 10.0);
        assert!((release - 120.0).abs() < 1e-4);

        settings.topology = Topology::Aggressive;
        settings.attack_ms = 0.1;
        let (attack, release) = settings.effective_times_ms();
        assert!((attack - 0.1).abs() < 1e-6);
        assert_eq!(release, 100.0);

        assert_eq!(Topology::from_index(1.0), Topology::Aggressive);
        assert_eq!(Topology::from_index(2.2), Topology::Smooth);
        assert_eq!(Topology::from_index(0.0), Topology::Clean);
    }

    // -------------------------------------------------------------------------
    // Engine behaviour
    // -------------------------------------------------------------------------

    #[test]
    fn test_gain_computer_hard_knee() {
        let engine = DynamicsEngine::new(DynamicsSettings {
            threshold_db: -20.0,
            ratio: 4.0,
            ..Default::default()
        });
        assert_eq!(engine.compute_gain_db(-30.0), 0.0);
        assert_eq!(engine.compute_gain_db(-20.0), 0.0);
        assert!((engine.compute_gain_db(-8.0) - (-9.0)).abs() < 1e-5);
    }

    #[test]
    fn test_static_convergence_on_constant_input() {
        let mut engine = prepared(
            DynamicsSettings {
                threshold_db: -20.0,
                ratio: 4.0,
                attack_ms: 5.0,
                release_ms: 50.0,
                ..Default::default()
            },
            1,
        );

        let mut y = 0.0;
        for _ in 0..SAMPLE_RATE {
            engine.tick_makeup();
            y = engine.process_sample(0, 0.5);
        }

        // 0.5 is about -6.02 dB: 13.98 dB over, reduced by 3/4
        let level_db = gain_to_db(0.5, LEVEL_FLOOR);
        let expected_db = (-20.0 - level_db) * 0.75;
        assert!((engine.gain_reduction_db(0) - expected_db).abs() < 0.01);
        assert!((y - 0.5 * db_to_gain(expected_db)).abs() < 1e-3);
    }

    #[test]
    fn test_rms_detector_tracks_sine() {
        let amplitude = 0.8;
        let mut engine = prepared(
            DynamicsSettings {
                detector: DetectorMode::Rms,
                threshold_db: 0.0,
                ..Default::default()
            },
            1,
        );
        let mut buffer = AudioBuffer::from_channels(vec![sine(amplitude, 1000.0, 48000)]);
        engine.process_block(&mut buffer);

        let expected = amplitude / 2.0_f32.sqrt();
        let level = engine.detector_level(0);
        assert!((level - expected).abs() / expected < 0.02, "rms {level}");
    }

    #[test]
    fn test_aggressive_topology_colors_output() {
        let settings = DynamicsSettings {
            threshold_db: 0.0,
            topology: Topology::Aggressive,
            ..Default::default()
        };
        let mut engine = prepared(settings, 1);
        engine.tick_makeup();
        let y = engine.process_sample(0, 0.5);
        assert!((y - (0.75_f32).tanh()).abs() < 1e-5);
    }

    #[test]
    fn test_makeup_ramps_without_jump() {
        let mut engine = prepared(DynamicsSettings { threshold_db: 0.0, ..Default::default() }, 1);
        engine.configure(DynamicsSettings {
            threshold_db: 0.0,
            makeup_db: 6.0,
            ..Default::default()
        });

        let mut buffer = AudioBuffer::from_channels(vec![vec![0.1; 4800]]);
        engine.process_block(&mut buffer);

        let out = buffer.channel(0);
        assert!(out[0] < 0.101, "first sample jumped: {}", out[0]);
        assert!((out[2399] - 0.1 * db_to_gain(6.0)).abs() < 1e-4);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut engine = prepared(DynamicsSettings::default(), 2);
        let mut buffer = AudioBuffer::from_channels(vec![vec![1.0; 512], vec![1.0; 512]]);
        engine.process_block(&mut buffer);
        assert!(engine.gain_reduction_db(0) < 0.0);

        engine.reset();
        assert_eq!(engine.gain_reduction_db(0), 0.0);
        assert_eq!(engine.detector_level(1), 0.0);
    }

    #[test]
    fn test_ratio_is_clamped() {
        let engine = DynamicsEngine::new(DynamicsSettings {
            ratio: 0.2,
            ..Default::default()
        });
        assert_eq!(engine.settings().ratio, 1.0);
        assert_eq!(engine.compute_gain_db(0.0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_no_compression_below_threshold(
            samples in prop::collection::vec(-0.5f32..0.5, 1..1024),
            attack in 0.1f32..100.0,
            release in 5.0f32..1000.0,
            ratio in 1.0f32..20.0,
            rms in any::<bool>(),
        ) {
            // Threshold 1 dB above the loudest possible sample
            let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            let settings = DynamicsSettings {
                threshold_db: gain_to_db(peak, LEVEL_FLOOR) + 1.0,
                ratio,
                attack_ms: attack,
                release_ms: release,
                detector: if rms { DetectorMode::Rms } else { DetectorMode::Peak },
                ..Default::default()
            };
            let mut engine = prepared(settings, 1);
            let mut buffer = AudioBuffer::from_channels(vec![samples.clone()]);
            engine.process_block(&mut buffer);

            for (out, input) in buffer.channel(0).iter().zip(samples.iter()) {
                prop_assert!((out - input).abs() <= 1e-6 * input.abs().max(1e-6));
            }
        }
    }
}
