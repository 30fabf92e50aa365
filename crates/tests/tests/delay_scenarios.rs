//! End-to-end behaviour of the modulated delay

use morphfx_core::domain::dsp::filter::StateVariableFilter;
use morphfx_core::domain::dsp::tape_delay::{DelayMode, DelaySettings, ModulatedDelay};
use morphfx_core::domain::ProcessSpec;
use morphfx_tests::{argmax_abs, impulse, ms_to_samples, peak, process_in_blocks, sine, BLOCK_SIZE, SAMPLE_RATE};

fn clean_settings(time_ms: f32, feedback: f32, mix: f32) -> DelaySettings {
    DelaySettings {
        mode: DelayMode::Tape,
        time_ms,
        feedback,
        mix,
        wow: 0.0,
        flutter: 0.0,
        age: 0.0,
        ..DelaySettings::default()
    }
}

fn prepared(settings: DelaySettings, channels: usize) -> ModulatedDelay {
    let mut delay = ModulatedDelay::with_noise_seed(settings, 11);
    delay.prepare(&ProcessSpec::new(SAMPLE_RATE, BLOCK_SIZE, channels));
    delay
}

// ============================================================================
// ROUND TRIP
// ============================================================================

#[test]
fn test_round_trip_is_saturated_and_filtered_input() {
    let settings = clean_settings(10.0, 0.0, 1.0);
    let mut delay = prepared(settings, 1);
    let input = sine(0.7, 220.0, SAMPLE_RATE, 4096);
    let output = process_in_blocks(&input, 1, BLOCK_SIZE, |buffer| delay.process_block(buffer));

    let mut reference = StateVariableFilter::new();
    reference.prepare(SAMPLE_RATE as f32, 1);
    reference.set_cutoff(settings.loop_cutoff_hz());

    let offset = ms_to_samples(10.0, SAMPLE_RATE);
    for (n, &y) in output.iter().enumerate() {
        let delayed = if n >= offset { input[n - offset] } else { 0.0 };
        let saturated = ModulatedDelay::SATURATION.apply(delayed) * ModulatedDelay::SATURATION_LEVEL;
        let expected = reference.process_sample(0, saturated);
        assert!((y - expected).abs() < 1e-6, "sample {n}: {y} vs {expected}");
    }
}

// ============================================================================
// ECHO SCENARIO
// ============================================================================

#[test]
fn test_clean_echo_positions_and_decay() {
    let mut delay = prepared(clean_settings(300.0, 0.5, 0.5), 2);
    let period = ms_to_samples(300.0, SAMPLE_RATE);
    let input = impulse(0.1, 4 * period);
    let output = process_in_blocks(&input, 2, BLOCK_SIZE, |buffer| delay.process_block(buffer));

    let window = 200;
    let echo_peaks: Vec<usize> = (1..=3)
        .map(|k| argmax_abs(&output, k * period - window, k * period + window))
        .collect();

    assert!(echo_peaks[0].abs_diff(period) <= 4, "first echo at {}", echo_peaks[0]);
    for pair in echo_peaks.windows(2) {
        assert!((pair[1] - pair[0]).abs_diff(period) <= 4, "echo spacing {}", pair[1] - pair[0]);
    }

    // Nothing between the dry impulse and the first echo
    assert!(peak(&output[1..period - window]) < 1e-6);

    // Each repeat loses energy; in-loop saturation adds a little small-signal gain
    let energy = |k: usize| -> f32 { output[k * period - window..k * period + window].iter().sum() };
    for k in 1..3 {
        let ratio = energy(k + 1) / energy(k);
        assert!((0.4..0.8).contains(&ratio), "repeat {k} ratio {ratio}");
    }
}

#[test]
fn test_continuous_input_stays_bounded() {
    let mut delay = prepared(clean_settings(300.0, 0.5, 0.5), 2);
    let input = sine(0.5, 440.0, SAMPLE_RATE, 5 * SAMPLE_RATE as usize);
    let output = process_in_blocks(&input, 2, BLOCK_SIZE, |buffer| delay.process_block(buffer));

    assert!(output.iter().all(|s| s.is_finite()));
    assert!(peak(&output) < 1.5, "peak {}", peak(&output));

    // Level in the last second is no higher than in the second before it
    let sr = SAMPLE_RATE as usize;
    assert!(peak(&output[4 * sr..]) <= peak(&output[3 * sr..4 * sr]) + 0.05);
}

#[test]
fn test_full_feedback_is_still_bounded() {
    let mut delay = prepared(clean_settings(50.0, 1.0, 1.0), 1);
    let input = sine(1.0, 100.0, SAMPLE_RATE, 2 * SAMPLE_RATE as usize);
    let output = process_in_blocks(&input, 1, BLOCK_SIZE, |buffer| delay.process_block(buffer));
    assert!(output.iter().all(|s| s.is_finite() && s.abs() < 2.0));
}

// ============================================================================
// MODES AND MODULATION
// ============================================================================

#[test]
fn test_digital_mode_passes_through() {
    let settings = DelaySettings {
        mode: DelayMode::Digital,
        ..DelaySettings::default()
    };
    let mut delay = prepared(settings, 2);
    let input = sine(0.5, 1000.0, SAMPLE_RATE, 2048);
    let output = process_in_blocks(&input, 2, BLOCK_SIZE, |buffer| delay.process_block(buffer));
    assert_eq!(output, input);
}

#[test]
fn test_seeded_modulation_is_reproducible() {
    let settings = DelaySettings {
        time_ms: 20.0,
        wow: 1.0,
        flutter: 1.0,
        age: 1.0,
        ..DelaySettings::default()
    };
    let input = sine(0.5, 330.0, SAMPLE_RATE, 8192);
    let mut a = prepared(settings, 1);
    let mut b = prepared(settings, 1);
    let out_a = process_in_blocks(&input, 1, BLOCK_SIZE, |buffer| a.process_block(buffer));
    let out_b = process_in_blocks(&input, 1, BLOCK_SIZE, |buffer| b.process_block(buffer));
    assert_eq!(out_a, out_b);

    let mut clean = prepared(clean_settings(20.0, 0.5, 0.5), 1);
    let out_clean = process_in_blocks(&input, 1, BLOCK_SIZE, |buffer| clean.process_block(buffer));
    assert_ne!(out_a, out_clean);
}
