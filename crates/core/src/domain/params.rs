//! Control parameter store shared between the control and audio threads
//!
//! Parameters are registered off the audio thread, after which the store is
//! shared immutably (typically behind an `Arc`). Each value lives in a
//! lock-free atomic cell, so the control thread can write while the audio
//! thread reads at block boundaries without locking or allocating.

use crate::domain::audio::{EngineError, Result};
use crossbeam::atomic::AtomicCell;
use std::collections::HashMap;
use tracing::debug;

/// Range and default of one named control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamSpec {
    pub const fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
        }
    }

    /// Clamp a value into the registered range
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Id prefix for one module instance in the chain
///
/// Ids look like `SLOT_2_ADVDELAY_TIME`: the slot number is one-based, the
/// tag names the module kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamScope {
    prefix: String,
}

impl ParamScope {
    pub fn new(slot: usize, module_tag: &str) -> Self {
        Self {
            prefix: format!("SLOT_{}_{}_", slot + 1, module_tag),
        }
    }

    /// Fully qualified id of a parameter in this scope
    pub fn id(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

struct ParamCell {
    value: AtomicCell<f32>,
    spec: ParamSpec,
}

/// Mapping from string id to a live floating-point value
///
/// Reads and writes take `&self`; only registration needs `&mut self`.
#[derive(Default)]
pub struct ParameterStore {
    cells: HashMap<String, ParamCell>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single parameter at its default value
    pub fn register(&mut self, id: impl Into<String>, spec: ParamSpec) -> Result<()> {
        let id = id.into();
        if self.cells.contains_key(&id) {
            return Err(EngineError::DuplicateParameter(id));
        }
        let cell = ParamCell {
            value: AtomicCell::new(spec.clamp(spec.default)),
            spec,
        };
        self.cells.insert(id, cell);
        Ok(())
    }

    /// Register every parameter of a module layout under `scope`
    pub fn register_layout(&mut self, scope: &ParamScope, layout: &[ParamSpec]) -> Result<()> {
        for spec in layout {
            self.register(scope.id(spec.name), *spec)?;
        }
        debug!(prefix = scope.prefix(), count = layout.len(), "Registered parameter layout");
        Ok(())
    }

    /// Current value, or `None` if the id was never registered
    #[inline]
    pub fn get(&self, id: &str) -> Option<f32> {
        self.cells.get(id).map(|cell| cell.value.load())
    }

    /// Store a new value, clamped to the registered range
    ///
    /// Returns the value actually stored. NaN is rejected and the previous
    /// value kept.
    pub fn set(&self, id: &str, value: f32) -> Result<f32> {
        let cell = self
            .cells
            .get(id)
            .ok_or_else(|| EngineError::UnknownParameter(id.to_string()))?;
        if value.is_nan() {
            return Err(EngineError::InvalidConfiguration(format!("{id} must be a number")));
        }
        let clamped = cell.spec.clamp(value);
        cell.value.store(clamped);
        Ok(clamped)
    }

    /// Range and default of a registered parameter
    pub fn spec(&self, id: &str) -> Option<ParamSpec> {
        self.cells.get(id).map(|cell| cell.spec)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.cells.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("len", &self.cells.len())
            .finish()
    }
}
