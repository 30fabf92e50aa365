//! End-to-end behaviour of the morph controller

use morphfx_core::domain::dsp::morph::{
    MorphControls, MorphController, MorphMode, MorphPosition, TopologyPreset,
};
use morphfx_core::domain::ProcessSpec;
use morphfx_tests::{multichannel, sine, BLOCK_SIZE, SAMPLE_RATE};

fn prepared() -> MorphController {
    let mut morph = MorphController::new();
    morph.prepare(&ProcessSpec::new(SAMPLE_RATE, BLOCK_SIZE, 2));
    morph
}

fn manual(x: f32, y: f32) -> MorphControls {
    MorphControls {
        amount: 0.7,
        response: 0.3,
        mode: MorphMode::Manual,
        x,
        y,
        mix: 1.0,
    }
}

fn run_blocks(morph: &mut MorphController, controls: &MorphControls, blocks: usize) {
    let signal = sine(0.5, 440.0, SAMPLE_RATE, BLOCK_SIZE);
    for _ in 0..blocks {
        let mut buffer = multichannel(&signal, 2);
        morph.process_block(&mut buffer, controls);
    }
}

#[test]
fn test_manual_corners_reach_presets() {
    let corners = [
        (0.0, 0.0, TopologyPreset::VCA),
        (1.0, 0.0, TopologyPreset::FET),
        (0.0, 1.0, TopologyPreset::OPTO),
        (1.0, 1.0, TopologyPreset::VARI_MU),
    ];

    for (x, y, preset) in corners {
        let mut morph = prepared();
        let controls = manual(x, y);
        // 50 ms manual ramp is under ten blocks
        run_blocks(&mut morph, &controls, 10);

        let position = morph.position();
        assert!((position.x - x).abs() < 1e-4 && (position.y - y).abs() < 1e-4);
        assert!((morph.drive() - (1.0 + preset.saturation_drive)).abs() < 1e-3);
        assert_eq!(morph.curve(), preset.curve);

        // Response 0.3: attack 10^1.4 ms, release 10^2.55 ms; amount 0.7: 6.05:1
        let settings = morph.settings();
        let attack = 10f32.powf(1.4) * preset.attack_factor;
        let release = 10f32.powf(2.55) * preset.release_factor;
        let ratio = 6.05 * preset.ratio_factor;
        assert!((settings.attack_ms - attack).abs() < attack * 1e-3);
        assert!((settings.release_ms - release).abs() < release * 1e-3);
        assert!((settings.ratio - ratio).abs() < ratio * 1e-3);
        assert!((settings.threshold_db + 28.0).abs() < 1e-3);
    }
}

#[test]
fn test_converged_controls_are_idempotent() {
    let mut morph = prepared();
    let controls = manual(0.25, 0.8);
    run_blocks(&mut morph, &controls, 20);
    let settled = (*morph.settings(), morph.position(), morph.curve());

    run_blocks(&mut morph, &controls, 5);
    assert_eq!((*morph.settings(), morph.position(), morph.curve()), settled);
}

#[test]
fn test_auto_mode_stays_in_unit_square() {
    let mut morph = prepared();
    let controls = MorphControls::default();
    for block in 0..200 {
        // Alternate bursts and silence so both analyzers move
        let amplitude = if block % 20 < 10 { 0.8 } else { 0.0 };
        let freq = 200.0 + 40.0 * block as f32;
        let mut buffer = multichannel(&sine(amplitude, freq, SAMPLE_RATE, BLOCK_SIZE), 2);
        morph.process_block(&mut buffer, &controls);

        let MorphPosition { x, y } = morph.position();
        assert!((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));
        assert!((0..BLOCK_SIZE).all(|i| buffer.sample(0, i).is_finite()));
    }
}

#[test]
fn test_zero_mix_is_dry() {
    let mut morph = prepared();
    let controls = MorphControls {
        mix: 0.0,
        amount: 1.0,
        ..manual(1.0, 0.0)
    };
    let signal = sine(0.9, 440.0, SAMPLE_RATE, BLOCK_SIZE);
    let mut buffer = multichannel(&signal, 2);
    morph.process_block(&mut buffer, &controls);
    assert_eq!(buffer.channel(0), signal.as_slice());
}

#[test]
fn test_reset_returns_to_center() {
    let mut morph = prepared();
    run_blocks(&mut morph, &manual(1.0, 1.0), 10);
    morph.reset();
    assert_eq!(morph.position(), MorphPosition::CENTER);
    assert_eq!(morph.latency_samples(), 256);
}
