//! morphfx CLI Application
//!
//! Renders a generated test signal through a configured chain and reports
//! levels, or lists the controls a module exposes.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use morphfx_core::domain::dsp::modulation::{NoiseColor, NoiseGenerator};
use morphfx_core::domain::{AudioBuffer, EngineConfig, ModuleKind, SlotConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "morphfx")]
#[command(about = "Dynamics, tape delay and morphing compression", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a test signal through a chain and print output levels
    Render {
        /// Engine configuration (TOML); compressor, delay and morph when absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Test signal fed to every channel
        #[arg(short, long, value_enum, default_value_t = Signal::Sine)]
        signal: Signal,

        /// Signal length in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f32,

        /// Control overrides as ID=VALUE, e.g. SLOT_1_ADVCOMP_RATIO=8
        #[arg(long = "set", value_name = "ID=VALUE")]
        overrides: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the controls of a module
    Params {
        #[arg(short, long, value_enum)]
        module: ModuleArg,

        /// Slot position (one-based) used to build the ids
        #[arg(long, default_value_t = 1)]
        slot: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Signal {
    Impulse,
    Sine,
    Noise,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModuleArg {
    Compressor,
    TapeDelay,
    Morph,
}

impl From<ModuleArg> for ModuleKind {
    fn from(arg: ModuleArg) -> Self {
        match arg {
            ModuleArg::Compressor => ModuleKind::Compressor,
            ModuleArg::TapeDelay => ModuleKind::TapeDelay,
            ModuleArg::Morph => ModuleKind::Morph,
        }
    }
}

#[derive(Debug, Serialize)]
struct RenderReport {
    sample_rate: u32,
    channels: usize,
    samples: usize,
    slots: Vec<&'static str>,
    latency_samples: usize,
    tail_seconds: f32,
    input_peak: f32,
    output_peak: f32,
    output_rms: f32,
}

fn default_config() -> EngineConfig {
    EngineConfig {
        noise_seed: Some(1),
        slots: vec![
            SlotConfig::new(ModuleKind::Compressor),
            SlotConfig::new(ModuleKind::TapeDelay),
            SlotConfig::new(ModuleKind::Morph),
        ],
        ..EngineConfig::default()
    }
}

fn generate(signal: Signal, sample_rate: u32, samples: usize) -> Vec<f32> {
    match signal {
        Signal::Impulse => {
            let mut data = vec![0.0; samples];
            if let Some(first) = data.first_mut() {
                *first = 1.0;
            }
            data
        }
        Signal::Sine => (0..samples)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect(),
        Signal::Noise => {
            let mut noise = NoiseGenerator::with_seed(NoiseColor::White, 7);
            (0..samples).map(|_| 0.5 * noise.next_value()).collect()
        }
    }
}

fn parse_override(raw: &str) -> anyhow::Result<(&str, f32)> {
    let (id, value) = raw
        .split_once('=')
        .with_context(|| format!("override '{raw}' is not ID=VALUE"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .with_context(|| format!("override '{raw}' has a non-numeric value"))?;
    Ok((id.trim(), value))
}

async fn render(
    config: Option<PathBuf>,
    signal: Signal,
    seconds: f32,
    overrides: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => EngineConfig::load_from_file(&path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => default_config(),
    };
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be positive");
    }

    let mut chain = config.build_chain()?;
    for raw in overrides {
        let (id, value) = parse_override(raw)?;
        let applied = chain.store().set(id, value)?;
        debug!(id, value = applied, "Override applied");
    }

    let samples = (seconds * config.sample_rate as f32).round() as usize;
    let input = generate(signal, config.sample_rate, samples);
    let mut buffer = AudioBuffer::from_channels(vec![input; config.channels]);
    let input_peak = buffer.peak();

    info!(samples, slots = chain.len(), "Rendering");
    chain.process_long(&mut buffer)?;

    let sum_sq: f32 = (0..buffer.num_channels())
        .flat_map(|ch| buffer.channel(ch).iter())
        .map(|s| s * s)
        .sum();
    let total = (buffer.num_channels() * buffer.num_samples()).max(1);

    let report = RenderReport {
        sample_rate: config.sample_rate,
        channels: config.channels,
        samples,
        slots: chain.slots().iter().map(|s| s.kind.display_name()).collect(),
        latency_samples: chain.latency_samples(),
        tail_seconds: chain.tail_seconds(),
        input_peak,
        output_peak: buffer.peak(),
        output_rms: (sum_sq / total as f32).sqrt(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("slots:    {}", report.slots.join(" -> "));
        println!("format:   {} Hz, {} ch, {} samples", report.sample_rate, report.channels, report.samples);
        println!("latency:  {} samples", report.latency_samples);
        println!("tail:     {:.1} s", report.tail_seconds);
        println!("in peak:  {:.4}", report.input_peak);
        println!("out peak: {:.4}", report.output_peak);
        println!("out rms:  {:.4}", report.output_rms);
    }
    Ok(())
}

fn list_params(module: ModuleKind, slot: usize) -> anyhow::Result<()> {
    if slot == 0 {
        bail!("slots are numbered from 1");
    }
    let scope = module.scope(slot - 1);
    println!("{} ({})", module.display_name(), module.tag());
    for spec in module.layout() {
        println!(
            "  {:<28} {:>9.2} .. {:<9.2} default {}",
            scope.id(spec.name),
            spec.min,
            spec.max,
            spec.default
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Render {
            config,
            signal,
            seconds,
            overrides,
            json,
        } => render(config, signal, seconds, &overrides, json).await,
        Command::Params { module, slot } => list_params(module.into(), slot),
    }
}
