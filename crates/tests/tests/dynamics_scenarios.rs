//! End-to-end behaviour of the dynamics engine

use morphfx_core::domain::dsp::dynamics::{DetectorMode, DynamicsEngine, DynamicsSettings, Topology};
use morphfx_core::domain::{gain_to_db, ProcessSpec};
use morphfx_tests::{constant, impulse, ms_to_samples, process_in_blocks, rms, sine, BLOCK_SIZE, SAMPLE_RATE};
use proptest::prelude::*;

fn scenario_settings() -> DynamicsSettings {
    DynamicsSettings {
        threshold_db: -20.0,
        ratio: 4.0,
        attack_ms: 10.0,
        release_ms: 100.0,
        makeup_db: 0.0,
        topology: Topology::Clean,
        detector: DetectorMode::Peak,
        ..DynamicsSettings::default()
    }
}

fn prepared(settings: DynamicsSettings, channels: usize) -> DynamicsEngine {
    let mut engine = DynamicsEngine::new(settings);
    engine.prepare(&ProcessSpec::new(SAMPLE_RATE, BLOCK_SIZE, channels));
    engine
}

/// Gain reduction after every sample of a mono signal
fn reduction_trace(engine: &mut DynamicsEngine, signal: &[f32]) -> Vec<f32> {
    signal
        .iter()
        .map(|&x| {
            engine.tick_makeup();
            let _ = engine.process_sample(0, x);
            engine.gain_reduction_db(0)
        })
        .collect()
}

// ============================================================================
// IMPULSE SCENARIO
// ============================================================================

#[test]
fn test_impulse_reduction_spikes_then_releases_monotonically() {
    let mut engine = prepared(scenario_settings(), 1);
    let trace = reduction_trace(&mut engine, &impulse(1.0, SAMPLE_RATE as usize));

    let (min_index, min_db) = trace
        .iter()
        .copied()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap();

    // The deepest point lies inside the attack window
    assert!(min_index < ms_to_samples(10.0, SAMPLE_RATE), "min at {min_index}");
    assert!(min_db < -0.3, "reduction only reached {min_db} dB");
    // Never deeper than the target for the first detector reading
    assert!(min_db > -4.2, "reduction overshot to {min_db} dB");

    for pair in trace[min_index..].windows(2) {
        assert!(pair[1] >= pair[0] - 1e-6, "release not monotonic: {} -> {}", pair[0], pair[1]);
    }

    // Five release time constants later the gain is back at unity
    let settled = trace[min_index + ms_to_samples(500.0, SAMPLE_RATE)];
    assert!(settled > -0.01, "still reducing {settled} dB");
}

#[test]
fn test_impulse_in_blocks_matches_sample_loop() {
    let signal = impulse(1.0, 4 * BLOCK_SIZE);

    let mut block_engine = prepared(scenario_settings(), 1);
    let blocks = process_in_blocks(&signal, 1, BLOCK_SIZE, |buffer| block_engine.process_block(buffer));

    let mut sample_engine = prepared(scenario_settings(), 1);
    let samples: Vec<f32> = signal
        .iter()
        .map(|&x| {
            sample_engine.tick_makeup();
            sample_engine.process_sample(0, x)
        })
        .collect();

    assert_eq!(blocks, samples);
}

// ============================================================================
// STATIC BEHAVIOUR
// ============================================================================

#[test]
fn test_static_convergence_to_gain_computer() {
    let mut engine = prepared(scenario_settings(), 1);
    let trace = reduction_trace(&mut engine, &constant(0.5, SAMPLE_RATE as usize));

    let expected = engine.compute_gain_db(gain_to_db(0.5, 0.0));
    let last = *trace.last().unwrap();
    assert!((last - expected).abs() < 0.05, "converged to {last}, expected {expected}");
}

#[test]
fn test_rms_detector_reads_sine_rms() {
    let settings = DynamicsSettings {
        detector: DetectorMode::Rms,
        ..scenario_settings()
    };
    let mut engine = prepared(settings, 1);
    let signal = sine(0.8, 1000.0, SAMPLE_RATE, SAMPLE_RATE as usize / 2);
    let _ = reduction_trace(&mut engine, &signal);

    let expected = 0.8 / std::f32::consts::SQRT_2;
    assert!((engine.detector_level(0) - expected).abs() < 0.03);
    assert!((rms(&signal) - expected).abs() < 0.01);
}

#[test]
fn test_channels_are_detected_independently() {
    let mut engine = prepared(scenario_settings(), 2);
    for _ in 0..4800 {
        engine.tick_makeup();
        let _ = engine.process_sample(0, 0.9);
        let _ = engine.process_sample(1, 0.01);
    }
    assert!(engine.gain_reduction_db(0) < -5.0);
    assert_eq!(engine.gain_reduction_db(1), 0.0);
}

proptest! {
    #[test]
    fn prop_quiet_signals_pass_untouched(
        amplitude in 0.0f32..0.09,
        freq in 50.0f32..5000.0,
    ) {
        // Peak detector never exceeds the input peak, which stays under -20 dB
        let mut engine = prepared(scenario_settings(), 1);
        let signal = sine(amplitude, freq, SAMPLE_RATE, 2048);
        let out = process_in_blocks(&signal, 1, BLOCK_SIZE, |buffer| engine.process_block(buffer));
        for (x, y) in signal.iter().zip(&out) {
            prop_assert!((x - y).abs() < 1e-6);
        }
    }
}
