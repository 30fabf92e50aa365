//! Domain entities and business rules

pub mod analysis;
pub mod audio;
pub mod chain;
pub mod config;
pub mod dsp;
pub mod params;
pub mod slots;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{db_to_gain, gain_to_db, AudioBuffer, EngineError, ProcessSpec, SampleRate};
pub use chain::{ChainSlot, ModuleChain};
pub use config::{ConfigError, EngineConfig, SlotConfig};
pub use dsp::{ProcessStatus, Processor};
pub use params::{ParamScope, ParamSpec, ParameterStore};
pub use slots::{CompressorSlot, DelaySlot, ModuleKind, MorphSlot};
