//! Morphing compressor
//!
//! A point in the unit square blends four compressor topologies:
//!
//! ```text
//!  y=1  Opto ---- VariMu
//!        |          |
//!  y=0  VCA  ----  FET
//!       x=0        x=1
//! ```
//!
//! The point is either set by hand or follows the input: X tracks transient
//! strength and Y tracks spectral darkness (one minus the centroid). The
//! blended time, ratio and drive factors scale a base setting derived from
//! `amount` and `response`, and the result drives an owned [`DynamicsEngine`].

use crate::domain::analysis::{Analyzer, SpectralAnalyzer, TransientDetector};
use crate::domain::audio::{AudioBuffer, ProcessSpec};
use crate::domain::dsp::dynamics::{Curve, DetectorMode, DynamicsEngine, DynamicsSettings, Topology};
use crate::domain::dsp::limits;
use crate::domain::dsp::smoothing::LinearSmoother;
use tracing::{debug, trace};

// ============================================================================
// TOPOLOGY PRESETS
// ============================================================================

/// Corner of the morph square
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyPreset {
    pub attack_factor: f32,
    pub release_factor: f32,
    pub ratio_factor: f32,
    pub saturation_drive: f32,
    pub curve: Curve,
}

impl TopologyPreset {
    pub const VCA: Self = Self {
        attack_factor: 1.0,
        release_factor: 1.0,
        ratio_factor: 1.0,
        saturation_drive: 0.5,
        curve: Curve::Tanh(1.0),
    };
    pub const FET: Self = Self {
        attack_factor: 0.2,
        release_factor: 0.8,
        ratio_factor: 1.5,
        saturation_drive: 1.5,
        curve: Curve::Rational(0.7),
    };
    pub const OPTO: Self = Self {
        attack_factor: 2.0,
        release_factor: 1.5,
        ratio_factor: 0.8,
        saturation_drive: 0.2,
        curve: Curve::Tanh(0.8),
    };
    pub const VARI_MU: Self = Self {
        attack_factor: 1.5,
        release_factor: 2.0,
        ratio_factor: 0.9,
        saturation_drive: 1.0,
        curve: Curve::Tanh(1.5),
    };
}

/// Bilinear blend of four corner values, exact at the corners
///
/// `c00` sits at (0, 0), `c10` at (1, 0), `c01` at (0, 1), `c11` at (1, 1).
#[inline]
#[must_use]
pub fn bilinear(c00: f32, c10: f32, c01: f32, c11: f32, tx: f32, ty: f32) -> f32 {
    let bottom = c00 * (1.0 - tx) + c10 * tx;
    let top = c01 * (1.0 - tx) + c11 * tx;
    bottom * (1.0 - ty) + top * ty
}

#[inline]
fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

// ============================================================================
// CONTROLS
// ============================================================================

/// Smoothed position in the morph square
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphPosition {
    pub x: f32,
    pub y: f32,
}

impl MorphPosition {
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MorphMode {
    /// Position follows the input analysis
    #[default]
    Auto,
    /// Position comes from the X/Y controls
    Manual,
}

impl MorphMode {
    /// Choice parameter: 0 = Auto, 1 = Manual
    pub fn from_index(value: f32) -> Self {
        if value < 0.5 {
            MorphMode::Auto
        } else {
            MorphMode::Manual
        }
    }

    /// Position smoothing for this mode
    pub fn smoothing_sec(self) -> f32 {
        match self {
            MorphMode::Auto => 0.2,
            MorphMode::Manual => 0.05,
        }
    }
}

/// Per-block control values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphControls {
    pub amount: f32,
    pub response: f32,
    pub mode: MorphMode,
    pub x: f32,
    pub y: f32,
    pub mix: f32,
}

impl Default for MorphControls {
    fn default() -> Self {
        Self {
            amount: 0.5,
            response: 0.5,
            mode: MorphMode::Auto,
            x: 0.5,
            y: 0.5,
            mix: 1.0,
        }
    }
}

/// Compressor settings and saturation derived from one morph position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphBlend {
    pub settings: DynamicsSettings,
    pub curve: Curve,
    pub drive: f32,
}

impl MorphBlend {
    /// Drive at or below this leaves the signal unsaturated
    pub const DRIVE_EPSILON: f32 = 1.01;

    pub fn compute(amount: f32, response: f32, position: MorphPosition) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        let response = response.clamp(0.0, 1.0);
        let MorphPosition { x, y } = position;

        let (vca, fet, opto, vari) = (
            TopologyPreset::VCA,
            TopologyPreset::FET,
            TopologyPreset::OPTO,
            TopologyPreset::VARI_MU,
        );
        let attack_factor = bilinear(vca.attack_factor, fet.attack_factor, opto.attack_factor, vari.attack_factor, x, y);
        let release_factor = bilinear(vca.release_factor, fet.release_factor, opto.release_factor, vari.release_factor, x, y);
        let ratio_factor = bilinear(vca.ratio_factor, fet.ratio_factor, opto.ratio_factor, vari.ratio_factor, x, y);
        let drive = bilinear(vca.saturation_drive, fet.saturation_drive, opto.saturation_drive, vari.saturation_drive, x, y);

        let base_threshold = lerp(0.0, -40.0, amount);
        let base_ratio = lerp(1.5, 8.0, amount);
        let base_attack_ms = 10.0_f32.powf(lerp(2.0, 0.0, response));
        let base_release_ms = 10.0_f32.powf(lerp(3.0, 1.5, response));

        let settings = DynamicsSettings {
            threshold_db: base_threshold,
            ratio: (base_ratio * ratio_factor).clamp(limits::RATIO_MIN, limits::RATIO_MAX),
            attack_ms: (base_attack_ms * attack_factor).clamp(limits::ATTACK_MS_MIN, limits::ATTACK_MS_MAX),
            release_ms: (base_release_ms * release_factor)
                .clamp(limits::RELEASE_MS_MIN, limits::RELEASE_MS_MAX),
            makeup_db: 0.0,
            topology: Topology::Clean,
            detector: DetectorMode::Peak,
            ..DynamicsSettings::default()
        };

        Self {
            settings,
            curve: Self::quadrant_curve(position),
            drive: 1.0 + drive,
        }
    }

    /// Saturation curve of the quadrant the position falls in
    pub fn quadrant_curve(position: MorphPosition) -> Curve {
        let MorphPosition { x, y } = position;
        if x > 0.5 && y < 0.5 {
            TopologyPreset::FET.curve
        } else if x < 0.5 && y > 0.5 {
            TopologyPreset::OPTO.curve
        } else if x > 0.5 && y > 0.5 {
            TopologyPreset::VARI_MU.curve
        } else {
            TopologyPreset::VCA.curve
        }
    }

    /// Drive into the curve and back out, or pass through at low drive
    #[inline]
    pub fn saturate(&self, x: f32) -> f32 {
        if self.drive > Self::DRIVE_EPSILON {
            self.curve.apply(x * self.drive) / self.drive
        } else {
            x
        }
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Analysis-driven morphing compressor
#[derive(Debug)]
pub struct MorphController<S: Analyzer = SpectralAnalyzer, T: Analyzer = TransientDetector> {
    spectral: S,
    transient: T,
    compressor: DynamicsEngine,
    x: LinearSmoother,
    y: LinearSmoother,
    blend: MorphBlend,
    sample_rate: f32,
    channels: usize,
    latency: usize,
}

impl MorphController {
    pub fn new() -> Self {
        Self::with_analyzers(SpectralAnalyzer::new(), TransientDetector::new())
    }
}

impl Default for MorphController {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Analyzer, T: Analyzer> MorphController<S, T> {
    /// Ramp used until the first block picks a mode
    pub const INITIAL_SMOOTHING_SEC: f32 = 0.1;

    pub fn with_analyzers(spectral: S, transient: T) -> Self {
        let blend = MorphBlend::compute(0.5, 0.5, MorphPosition::CENTER);
        Self {
            spectral,
            transient,
            compressor: DynamicsEngine::new(blend.settings),
            x: LinearSmoother::new(0.5),
            y: LinearSmoother::new(0.5),
            blend,
            sample_rate: 44100.0,
            channels: 0,
            latency: 0,
        }
    }

    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate.as_f32();
        self.channels = spec.channels;

        self.spectral.prepare(spec);
        self.transient.prepare(spec);
        self.compressor.prepare(spec);
        self.x.set_ramp_time(self.sample_rate, Self::INITIAL_SMOOTHING_SEC);
        self.y.set_ramp_time(self.sample_rate, Self::INITIAL_SMOOTHING_SEC);

        // Queried once; analyzers cannot change latency after prepare
        self.latency = self
            .spectral
            .latency_samples()
            .max(self.transient.latency_samples());

        self.reset();
        debug!(
            sample_rate = self.sample_rate,
            channels = self.channels,
            latency = self.latency,
            "Morph controller prepared"
        );
    }

    pub fn reset(&mut self) {
        self.spectral.reset();
        self.transient.reset();
        self.compressor.reset();
        self.x.set_current_and_target(0.5);
        self.y.set_current_and_target(0.5);
    }

    /// Smoothed position as of the last processed block
    pub fn position(&self) -> MorphPosition {
        MorphPosition {
            x: self.x.current(),
            y: self.y.current(),
        }
    }

    /// Compressor settings currently applied
    pub fn settings(&self) -> &DynamicsSettings {
        self.compressor.settings()
    }

    pub fn curve(&self) -> Curve {
        self.blend.curve
    }

    pub fn drive(&self) -> f32 {
        self.blend.drive
    }

    pub fn latency_samples(&self) -> usize {
        self.latency
    }

    /// Analyse, re-target, reconfigure, then process the block in place
    pub fn process_block(&mut self, buffer: &mut AudioBuffer, controls: &MorphControls) {
        let n = buffer.num_samples();
        if n == 0 {
            return;
        }
        let channels = buffer.num_channels().min(self.channels);

        // Mono analysis pass
        if channels > 0 {
            let scale = 1.0 / channels as f32;
            for i in 0..n {
                let mono = (0..channels).map(|ch| buffer.sample(ch, i)).sum::<f32>() * scale;
                self.spectral.process_sample(mono);
                self.transient.process_sample(mono);
            }
        }

        let (target_x, target_y) = match controls.mode {
            MorphMode::Auto => (
                self.transient.current_value(),
                1.0 - self.spectral.current_value(),
            ),
            MorphMode::Manual => (controls.x, controls.y),
        };

        let ramp = controls.mode.smoothing_sec();
        self.x.set_ramp_time(self.sample_rate, ramp);
        self.y.set_ramp_time(self.sample_rate, ramp);
        self.x.set_target(target_x.clamp(0.0, 1.0));
        self.y.set_target(target_y.clamp(0.0, 1.0));

        // One value per block, then keep the ramps in step with the samples
        let position = MorphPosition {
            x: self.x.next_value(),
            y: self.y.next_value(),
        };
        self.x.advance(n - 1);
        self.y.advance(n - 1);

        let blend = MorphBlend::compute(controls.amount, controls.response, position);
        if blend != self.blend {
            trace!(x = position.x, y = position.y, drive = blend.drive, "Morph blend updated");
        }
        self.blend = blend;
        self.compressor.configure(blend.settings);

        let mix = controls.mix.clamp(0.0, 1.0);
        for i in 0..n {
            self.compressor.tick_makeup();
            for ch in 0..channels {
                let dry = buffer.sample(ch, i);
                let wet = self.blend.saturate(self.compressor.process_sample(ch, dry));
                buffer.set_sample(ch, i, dry * (1.0 - mix) + wet * mix);
            }
        }
    }
}
