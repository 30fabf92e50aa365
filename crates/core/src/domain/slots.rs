//! Effect modules bound to the parameter store
//!
//! A slot owns one engine and the ids of its controls. Once per block it
//! pulls a snapshot of every control; if any id is missing the block is
//! skipped and left untouched. Ids are built when the slot is created, so
//! the audio thread only performs lookups.

use crate::domain::audio::{AudioBuffer, ProcessSpec, Result};
use crate::domain::dsp::dynamics::{DetectorMode, DynamicsEngine, DynamicsSettings, Topology};
use crate::domain::dsp::morph::{MorphControls, MorphController, MorphMode};
use crate::domain::dsp::tape_delay::{DelayMode, DelaySettings, ModulatedDelay};
use crate::domain::dsp::{ProcessStatus, Processor};
use crate::domain::params::{ParamScope, ParamSpec, ParameterStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, trace};

// ============================================================================
// MODULE KINDS AND PARAMETER LAYOUTS
// ============================================================================

/// Effect module that can occupy a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Compressor,
    TapeDelay,
    Morph,
}

pub const COMPRESSOR_LAYOUT: [ParamSpec; 7] = [
    ParamSpec::new("TOPOLOGY", 0.0, 2.0, 0.0),
    ParamSpec::new("DETECTOR", 0.0, 1.0, 0.0),
    ParamSpec::new("THRESHOLD", -60.0, 0.0, -12.0),
    ParamSpec::new("RATIO", 1.0, 20.0, 4.0),
    ParamSpec::new("ATTACK", 0.1, 500.0, 20.0),
    ParamSpec::new("RELEASE", 10.0, 2000.0, 200.0),
    ParamSpec::new("MAKEUP", 0.0, 24.0, 0.0),
];

pub const DELAY_LAYOUT: [ParamSpec; 8] = [
    ParamSpec::new("MODE", 0.0, 2.0, 0.0),
    ParamSpec::new("TIME", 1.0, 2000.0, 500.0),
    ParamSpec::new("FEEDBACK", 0.0, 1.0, 0.5),
    ParamSpec::new("MIX", 0.0, 1.0, 0.5),
    ParamSpec::new("COLOR", 200.0, 15000.0, 5000.0),
    ParamSpec::new("WOW", 0.0, 1.0, 0.2),
    ParamSpec::new("FLUTTER", 0.0, 1.0, 0.1),
    ParamSpec::new("AGE", 0.0, 1.0, 0.5),
];

pub const MORPH_LAYOUT: [ParamSpec; 6] = [
    ParamSpec::new("AMOUNT", 0.0, 1.0, 0.5),
    ParamSpec::new("RESPONSE", 0.0, 1.0, 0.5),
    ParamSpec::new("MODE", 0.0, 1.0, 0.0),
    ParamSpec::new("X", 0.0, 1.0, 0.5),
    ParamSpec::new("Y", 0.0, 1.0, 0.5),
    ParamSpec::new("MIX", 0.0, 1.0, 1.0),
];

impl ModuleKind {
    pub const ALL: [ModuleKind; 3] = [ModuleKind::Compressor, ModuleKind::TapeDelay, ModuleKind::Morph];

    /// Id segment between the slot number and the control name
    pub fn tag(self) -> &'static str {
        match self {
            ModuleKind::Compressor => "ADVCOMP",
            ModuleKind::TapeDelay => "ADVDELAY",
            ModuleKind::Morph => "MORPHO",
        }
    }

    pub fn layout(self) -> &'static [ParamSpec] {
        match self {
            ModuleKind::Compressor => &COMPRESSOR_LAYOUT,
            ModuleKind::TapeDelay => &DELAY_LAYOUT,
            ModuleKind::Morph => &MORPH_LAYOUT,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModuleKind::Compressor => "Compressor",
            ModuleKind::TapeDelay => "Tape Delay",
            ModuleKind::Morph => "Morph",
        }
    }

    pub fn scope(self, slot: usize) -> ParamScope {
        ParamScope::new(slot, self.tag())
    }

    /// Register this module's controls for `slot`
    pub fn register(self, slot: usize, store: &mut ParameterStore) -> Result<ParamScope> {
        let scope = self.scope(slot);
        store.register_layout(&scope, self.layout())?;
        Ok(scope)
    }

    /// Build the processor for `slot`
    ///
    /// `noise_seed` makes delay modulation reproducible.
    pub fn create(self, slot: usize, store: Arc<ParameterStore>, noise_seed: Option<u64>) -> Box<dyn Processor> {
        match self {
            ModuleKind::Compressor => Box::new(CompressorSlot::new(slot, store)),
            ModuleKind::TapeDelay => Box::new(match noise_seed {
                Some(seed) => DelaySlot::with_noise_seed(slot, store, seed),
                None => DelaySlot::new(slot, store),
            }),
            ModuleKind::Morph => Box::new(MorphSlot::new(slot, store)),
        }
    }
}

fn scoped_ids<const N: usize>(scope: &ParamScope, layout: &[ParamSpec; N]) -> [String; N] {
    std::array::from_fn(|i| scope.id(layout[i].name))
}

/// Read every id, or nothing if one is missing
#[inline]
fn read_block<const N: usize>(store: &ParameterStore, ids: &[String; N]) -> Option<[f32; N]> {
    let mut values = [0.0; N];
    for (value, id) in values.iter_mut().zip(ids) {
        *value = store.get(id)?;
    }
    Some(values)
}

// ============================================================================
// BLOCK SNAPSHOTS
// ============================================================================

/// Compressor controls for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    pub topology: Topology,
    pub detector: DetectorMode,
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub makeup_db: f32,
}

impl CompressorParams {
    pub fn read(store: &ParameterStore, ids: &[String; 7]) -> Option<Self> {
        let [topology, detector, threshold_db, ratio, attack_ms, release_ms, makeup_db] =
            read_block(store, ids)?;
        Some(Self {
            topology: Topology::from_index(topology),
            detector: DetectorMode::from_index(detector),
            threshold_db,
            ratio,
            attack_ms,
            release_ms,
            makeup_db,
        })
    }

    pub fn settings(&self) -> DynamicsSettings {
        DynamicsSettings {
            threshold_db: self.threshold_db,
            ratio: self.ratio,
            attack_ms: self.attack_ms,
            release_ms: self.release_ms,
            makeup_db: self.makeup_db,
            topology: self.topology,
            detector: self.detector,
            ..DynamicsSettings::default()
        }
    }
}

/// Delay controls for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParams(pub DelaySettings);

impl DelayParams {
    pub fn read(store: &ParameterStore, ids: &[String; 8]) -> Option<Self> {
        let [mode, time_ms, feedback, mix, color_hz, wow, flutter, age] = read_block(store, ids)?;
        Some(Self(DelaySettings {
            mode: DelayMode::from_index(mode),
            time_ms,
            feedback,
            mix,
            color_hz,
            wow,
            flutter,
            age,
        }))
    }
}

/// Morph controls for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphParams(pub MorphControls);

impl MorphParams {
    pub fn read(store: &ParameterStore, ids: &[String; 6]) -> Option<Self> {
        let [amount, response, mode, x, y, mix] = read_block(store, ids)?;
        Some(Self(MorphControls {
            amount,
            response,
            mode: MorphMode::from_index(mode),
            x,
            y,
            mix,
        }))
    }
}

// ============================================================================
// SLOT STATE
// ============================================================================

/// Bookkeeping shared by all slots
#[derive(Debug)]
struct SlotState {
    slot: usize,
    store: Arc<ParameterStore>,
    channels: usize,
    bypass: bool,
    ready: bool,
}

impl SlotState {
    fn new(slot: usize, store: Arc<ParameterStore>) -> Self {
        Self {
            slot,
            store,
            channels: 0,
            bypass: false,
            ready: true,
        }
    }

    /// Log readiness changes only, never once per block
    #[inline]
    fn track_ready(&mut self, ready: bool, kind: ModuleKind) {
        if ready != self.ready {
            self.ready = ready;
            if ready {
                trace!(slot = self.slot, module = kind.tag(), "Parameters available");
            } else {
                trace!(slot = self.slot, module = kind.tag(), "Parameters missing, skipping blocks");
            }
        }
    }
}

// ============================================================================
// COMPRESSOR SLOT
// ============================================================================

/// [`DynamicsEngine`] driven by `SLOT_n_ADVCOMP_*` controls
#[derive(Debug)]
pub struct CompressorSlot {
    state: SlotState,
    ids: [String; 7],
    engine: DynamicsEngine,
}

impl CompressorSlot {
    pub fn new(slot: usize, store: Arc<ParameterStore>) -> Self {
        let scope = ModuleKind::Compressor.scope(slot);
        Self {
            state: SlotState::new(slot, store),
            ids: scoped_ids(&scope, &COMPRESSOR_LAYOUT),
            engine: DynamicsEngine::default(),
        }
    }

    pub fn engine(&self) -> &DynamicsEngine {
        &self.engine
    }
}

impl Processor for CompressorSlot {
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;
        if let Some(params) = CompressorParams::read(&self.state.store, &self.ids) {
            self.engine.configure(params.settings());
        }
        self.engine.prepare(&spec);
        self.state.channels = spec.channels;
        info!(slot = self.state.slot, module = "compressor", "Slot prepared");
        Ok(())
    }

    fn reset(&mut self) {
        self.engine.reset();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> ProcessStatus {
        if self.state.bypass {
            return ProcessStatus::Bypassed;
        }
        let params = CompressorParams::read(&self.state.store, &self.ids);
        self.state.track_ready(params.is_some(), ModuleKind::Compressor);
        let Some(params) = params else {
            return ProcessStatus::ParametersNotReady;
        };

        buffer.clear_channels_from(self.state.channels);
        self.engine.configure(params.settings());
        self.engine.process_block(buffer);
        ProcessStatus::Processed
    }

    fn tail_seconds(&self) -> f32 {
        0.5
    }

    fn is_bypassed(&self) -> bool {
        self.state.bypass
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.state.bypass = bypass;
        if bypass {
            self.reset();
        }
    }

    fn name(&self) -> &str {
        ModuleKind::Compressor.display_name()
    }
}

// ============================================================================
// DELAY SLOT
// ============================================================================

/// [`ModulatedDelay`] driven by `SLOT_n_ADVDELAY_*` controls
#[derive(Debug)]
pub struct DelaySlot {
    state: SlotState,
    ids: [String; 8],
    engine: ModulatedDelay,
}

impl DelaySlot {
    const TIME: usize = 1;

    pub fn new(slot: usize, store: Arc<ParameterStore>) -> Self {
        Self::with_engine(slot, store, ModulatedDelay::default())
    }

    pub fn with_noise_seed(slot: usize, store: Arc<ParameterStore>, seed: u64) -> Self {
        Self::with_engine(slot, store, ModulatedDelay::with_noise_seed(DelaySettings::default(), seed))
    }

    fn with_engine(slot: usize, store: Arc<ParameterStore>, engine: ModulatedDelay) -> Self {
        let scope = ModuleKind::TapeDelay.scope(slot);
        Self {
            state: SlotState::new(slot, store),
            ids: scoped_ids(&scope, &DELAY_LAYOUT),
            engine,
        }
    }

    pub fn engine(&self) -> &ModulatedDelay {
        &self.engine
    }

    fn snap_to_time_param(&mut self) {
        if let Some(time_ms) = self.state.store.get(&self.ids[Self::TIME]) {
            self.engine.snap_time(time_ms);
        }
    }
}

impl Processor for DelaySlot {
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;
        if let Some(DelayParams(settings)) = DelayParams::read(&self.state.store, &self.ids) {
            self.engine.configure(settings);
        }
        self.engine.prepare(&spec);
        self.state.channels = spec.channels;
        info!(
            slot = self.state.slot,
            module = "tape_delay",
            max_delay_ms = self.engine.max_delay_ms(),
            "Slot prepared"
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.snap_to_time_param();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> ProcessStatus {
        if self.state.bypass {
            return ProcessStatus::Bypassed;
        }
        let params = DelayParams::read(&self.state.store, &self.ids);
        self.state.track_ready(params.is_some(), ModuleKind::TapeDelay);
        let Some(DelayParams(settings)) = params else {
            return ProcessStatus::ParametersNotReady;
        };

        buffer.clear_channels_from(self.state.channels);
        self.engine.configure(settings);
        self.engine.process_block(buffer);
        ProcessStatus::Processed
    }

    fn tail_seconds(&self) -> f32 {
        5.0
    }

    fn is_bypassed(&self) -> bool {
        self.state.bypass
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.state.bypass = bypass;
        if bypass {
            self.reset();
        }
    }

    fn name(&self) -> &str {
        ModuleKind::TapeDelay.display_name()
    }
}

// ============================================================================
// MORPH SLOT
// ============================================================================

/// [`MorphController`] driven by `SLOT_n_MORPHO_*` controls
#[derive(Debug)]
pub struct MorphSlot {
    state: SlotState,
    ids: [String; 6],
    controller: MorphController,
}

impl MorphSlot {
    pub fn new(slot: usize, store: Arc<ParameterStore>) -> Self {
        let scope = ModuleKind::Morph.scope(slot);
        Self {
            state: SlotState::new(slot, store),
            ids: scoped_ids(&scope, &MORPH_LAYOUT),
            controller: MorphController::new(),
        }
    }

    pub fn controller(&self) -> &MorphController {
        &self.controller
    }
}

impl Processor for MorphSlot {
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;
        self.controller.prepare(&spec);
        self.state.channels = spec.channels;
        info!(
            slot = self.state.slot,
            module = "morph",
            latency = self.controller.latency_samples(),
            "Slot prepared"
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.controller.reset();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) -> ProcessStatus {
        if self.state.bypass {
            return ProcessStatus::Bypassed;
        }
        let params = MorphParams::read(&self.state.store, &self.ids);
        self.state.track_ready(params.is_some(), ModuleKind::Morph);
        let Some(MorphParams(controls)) = params else {
            return ProcessStatus::ParametersNotReady;
        };

        buffer.clear_channels_from(self.state.channels);
        self.controller.process_block(buffer, &controls);
        ProcessStatus::Processed
    }

    fn latency_samples(&self) -> usize {
        self.controller.latency_samples()
    }

    fn tail_seconds(&self) -> f32 {
        0.5
    }

    fn is_bypassed(&self) -> bool {
        self.state.bypass
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.state.bypass = bypass;
        if bypass {
            self.reset();
        }
    }

    fn name(&self) -> &str {
        ModuleKind::Morph.display_name()
    }
}
