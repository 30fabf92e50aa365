//! Engine configuration
//!
//! This module provides:
//! - The TOML description of a processing chain (format and slots)
//! - Validation against the module parameter layouts
//! - Construction of the parameter store and chain from a configuration

use crate::domain::audio::{EngineError, ProcessSpec};
use crate::domain::chain::ModuleChain;
use crate::domain::params::ParameterStore;
use crate::domain::slots::ModuleKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// One slot of the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub module: ModuleKind,

    /// Initial values keyed by control name (`THRESHOLD`, `TIME`, ...)
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl SlotConfig {
    pub fn new(module: ModuleKind) -> Self {
        Self {
            module,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> usize {
    512
}

fn default_channels() -> usize {
    2
}

/// Processing format plus the ordered slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_block_size")]
    pub block_size: usize,

    #[serde(default = "default_channels")]
    pub channels: usize,

    /// Seed for modulation noise; entropy when absent
    #[serde(default)]
    pub noise_seed: Option<u64>,

    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            channels: default_channels(),
            noise_seed: None,
            slots: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&contents)?;

        debug!(slots = config.slots.len(), "Configuration loaded successfully");
        Ok(config)
    }

    pub fn process_spec(&self) -> ProcessSpec {
        ProcessSpec::new(self.sample_rate, self.block_size, self.channels)
    }

    pub fn modules(&self) -> Vec<ModuleKind> {
        self.slots.iter().map(|slot| slot.module).collect()
    }

    /// Check the format and that every override names a known control
    ///
    /// Override values outside a control's range are accepted and clamped
    /// when applied.
    pub fn validate(&self) -> Result<()> {
        self.process_spec().validate()?;

        for (index, slot) in self.slots.iter().enumerate() {
            let layout = slot.module.layout();
            for (name, value) in &slot.params {
                if !layout.iter().any(|spec| spec.name == name) {
                    return Err(ConfigError::Invalid(format!(
                        "slot {} ({}) has no parameter '{}'",
                        index + 1,
                        slot.module.tag(),
                        name
                    )));
                }
                if !value.is_finite() {
                    return Err(ConfigError::Invalid(format!(
                        "slot {} parameter '{}' is not finite",
                        index + 1,
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Register every slot's controls and apply the overrides
    pub fn register_parameters(&self, store: &mut ParameterStore) -> Result<()> {
        for (index, slot) in self.slots.iter().enumerate() {
            let scope = slot.module.register(index, store)?;
            for (name, &value) in &slot.params {
                let applied = store.set(&scope.id(name), value)?;
                debug!(id = %scope.id(name), value = applied, "Parameter override applied");
            }
        }
        Ok(())
    }

    pub fn build_store(&self) -> Result<ParameterStore> {
        let mut store = ParameterStore::new();
        self.register_parameters(&mut store)?;
        Ok(store)
    }

    /// Build and prepare the chain this configuration describes
    pub fn build_chain(&self) -> Result<ModuleChain> {
        self.validate()?;
        let store = Arc::new(self.build_store()?);
        let mut chain = ModuleChain::new(&self.modules(), store, self.noise_seed);
        chain.prepare(self.process_spec())?;
        Ok(chain)
    }
}
