//! Chains built from TOML configuration

use morphfx_core::domain::{
    AudioBuffer, ConfigError, EngineConfig, ModuleKind, ProcessSpec, ProcessStatus, Processor,
};
use morphfx_core::domain::slots::CompressorSlot;
use morphfx_tests::{impulse, multichannel, peak, sine, BLOCK_SIZE, SAMPLE_RATE};
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
sample_rate = 48000
block_size = 512
channels = 2
noise_seed = 5

[[slots]]
module = "compressor"
params = { THRESHOLD = -20.0, RATIO = 4.0, ATTACK = 10.0, RELEASE = 100.0 }

[[slots]]
module = "tape_delay"
params = { TIME = 300.0, FEEDBACK = 0.5, MIX = 0.5, WOW = 0.0, FLUTTER = 0.0, AGE = 0.0 }

[[slots]]
module = "morph"
params = { MIX = 0.0 }
"#;

#[tokio::test]
async fn test_chain_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("chain.toml");
    tokio::fs::write(&path, CONFIG).await.unwrap();

    let config = EngineConfig::load_from_file(&path).await.unwrap();
    let chain = config.build_chain().unwrap();

    assert_eq!(chain.len(), 3);
    assert_eq!(chain.latency_samples(), 256);
    assert_eq!(chain.tail_seconds(), 5.0);
    assert_eq!(chain.store().get("SLOT_2_ADVDELAY_TIME"), Some(300.0));
}

#[test]
fn test_chain_renders_bounded_echoes() {
    let mut chain = EngineConfig::from_toml_str(CONFIG).unwrap().build_chain().unwrap();
    let mut buffer = multichannel(&impulse(1.0, SAMPLE_RATE as usize), 2);
    chain.process_long(&mut buffer).unwrap();

    let echo = 14400;
    assert!(peak(&buffer.channel(0)[echo - 8..echo + 8]) > 0.03);
    assert!(buffer.peak() <= 1.0);
}

#[test]
fn test_live_parameter_changes_apply_next_block() {
    let mut chain = EngineConfig::from_toml_str(CONFIG).unwrap().build_chain().unwrap();
    chain.set_bypass(1, true).unwrap();
    chain.set_bypass(2, true).unwrap();

    let signal = sine(0.9, 440.0, SAMPLE_RATE, BLOCK_SIZE);
    for _ in 0..20 {
        let _ = chain.process(&mut multichannel(&signal, 2));
    }
    let mut before = multichannel(&signal, 2);
    let _ = chain.process(&mut before);

    chain.store().set("SLOT_1_ADVCOMP_RATIO", 20.0).unwrap();
    chain.store().set("SLOT_1_ADVCOMP_THRESHOLD", -40.0).unwrap();
    for _ in 0..20 {
        let _ = chain.process(&mut multichannel(&signal, 2));
    }
    let mut after = multichannel(&signal, 2);
    let _ = chain.process(&mut after);

    assert!(after.peak() < before.peak() * 0.5, "{} vs {}", after.peak(), before.peak());
}

#[test]
fn test_slot_without_registered_controls_is_skipped() {
    let store = EngineConfig::default().build_store().unwrap();
    let mut slot = CompressorSlot::new(0, Arc::new(store));
    slot.prepare(ProcessSpec::new(SAMPLE_RATE, BLOCK_SIZE, 2)).unwrap();

    let mut buffer = multichannel(&sine(0.9, 440.0, SAMPLE_RATE, BLOCK_SIZE), 2);
    let original = buffer.clone();
    assert_eq!(slot.process(&mut buffer), ProcessStatus::ParametersNotReady);
    assert_eq!(buffer, original);
}

#[test]
fn test_extra_buffer_channels_are_zeroed() {
    let config = EngineConfig {
        channels: 1,
        slots: vec![morphfx_core::domain::SlotConfig::new(ModuleKind::Compressor)],
        ..EngineConfig::default()
    };
    let mut chain = config.build_chain().unwrap();
    let mut buffer = AudioBuffer::from_channels(vec![vec![0.3; 128], vec![0.6; 128]]);
    assert_eq!(chain.process(&mut buffer), 1);
    assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
}

#[test]
fn test_invalid_override_is_reported() {
    let toml = r#"
[[slots]]
module = "tape_delay"
params = { SPEED = 1.0 }
"#;
    assert!(matches!(
        EngineConfig::from_toml_str(toml),
        Err(ConfigError::Invalid(_))
    ));
}
