//! Ordered chain of effect slots
//!
//! The chain owns one processor per configured slot and fans the lifecycle
//! calls out in order. Reported latency is the sum over active slots; the
//! tail is the longest one.

use crate::domain::audio::{AudioBuffer, EngineError, ProcessSpec, Result};
use crate::domain::dsp::{ProcessStatus, Processor};
use crate::domain::params::ParameterStore;
use crate::domain::slots::ModuleKind;
use std::sync::Arc;
use tracing::{debug, info};

/// One processor in the chain and the module it was built from
pub struct ChainSlot {
    pub kind: ModuleKind,
    pub processor: Box<dyn Processor>,
}

/// Effect slots processed in series
pub struct ModuleChain {
    slots: Vec<ChainSlot>,
    store: Arc<ParameterStore>,
    spec: Option<ProcessSpec>,
}

impl ModuleChain {
    /// Build a chain over an already registered store
    ///
    /// Each slot looks up ids scoped to its position, so `kinds[i]` must have
    /// been registered for slot `i`.
    pub fn new(kinds: &[ModuleKind], store: Arc<ParameterStore>, noise_seed: Option<u64>) -> Self {
        let slots = kinds
            .iter()
            .enumerate()
            .map(|(index, &kind)| {
                // Distinct but reproducible streams per slot
                let seed = noise_seed.map(|s| s.wrapping_add(index as u64));
                ChainSlot {
                    kind,
                    processor: kind.create(index, Arc::clone(&store), seed),
                }
            })
            .collect::<Vec<_>>();

        info!(slots = slots.len(), "Module chain created");
        Self {
            slots,
            store,
            spec: None,
        }
    }

    /// Register `kinds` in a fresh store and build the chain over it
    pub fn with_defaults(kinds: &[ModuleKind], noise_seed: Option<u64>) -> Result<Self> {
        let mut store = ParameterStore::new();
        for (index, kind) in kinds.iter().enumerate() {
            kind.register(index, &mut store)?;
        }
        Ok(Self::new(kinds, Arc::new(store), noise_seed))
    }

    pub fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;
        for slot in &mut self.slots {
            slot.processor.prepare(spec)?;
        }
        self.spec = Some(spec);

        info!(
            sample_rate = spec.sample_rate.hz(),
            block_size = spec.max_block_size,
            channels = spec.channels,
            latency = self.latency_samples(),
            "Module chain prepared"
        );
        Ok(())
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.processor.reset();
        }
        debug!("Module chain reset");
    }

    /// Run every slot over the block in order
    ///
    /// Returns how many slots actually processed the block.
    pub fn process(&mut self, buffer: &mut AudioBuffer) -> usize {
        self.slots
            .iter_mut()
            .map(|slot| slot.processor.process(buffer))
            .filter(|status| *status == ProcessStatus::Processed)
            .count()
    }

    /// Process a block longer than the prepared maximum in chunks
    pub fn process_long(&mut self, buffer: &mut AudioBuffer) -> Result<()> {
        let spec = self
            .spec
            .ok_or_else(|| EngineError::InvalidConfiguration("chain not prepared".to_string()))?;

        let total = buffer.num_samples();
        let channels = buffer.num_channels();
        let mut block = AudioBuffer::new(channels, spec.max_block_size);
        let mut start = 0;
        while start < total {
            let len = spec.max_block_size.min(total - start);
            block.set_num_samples(len);
            for ch in 0..channels {
                block
                    .channel_mut(ch)
                    .copy_from_slice(&buffer.channel(ch)[start..start + len]);
            }
            let _ = self.process(&mut block);
            for ch in 0..channels {
                buffer.channel_mut(ch)[start..start + len].copy_from_slice(block.channel(ch));
            }
            start += len;
        }
        Ok(())
    }

    /// Bypass one slot by index
    pub fn set_bypass(&mut self, index: usize, bypass: bool) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(EngineError::SlotOutOfRange(index))?;
        slot.processor.set_bypass(bypass);
        debug!(slot = index, bypass, "Slot bypass changed");
        Ok(())
    }

    pub fn is_bypassed(&self, index: usize) -> Result<bool> {
        self.slots
            .get(index)
            .map(|slot| slot.processor.is_bypassed())
            .ok_or(EngineError::SlotOutOfRange(index))
    }

    /// Sum of the latencies of active slots
    pub fn latency_samples(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !slot.processor.is_bypassed())
            .map(|slot| slot.processor.latency_samples())
            .sum()
    }

    /// Longest tail of any active slot
    pub fn tail_seconds(&self) -> f32 {
        self.slots
            .iter()
            .filter(|slot| !slot.processor.is_bypassed())
            .map(|slot| slot.processor.tail_seconds())
            .fold(0.0, f32::max)
    }

    pub fn slots(&self) -> &[ChainSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Shared control store
    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }
}

impl std::fmt::Debug for ModuleChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleChain")
            .field("slots", &self.slots.iter().map(|s| s.kind).collect::<Vec<_>>())
            .field("spec", &self.spec)
            .finish()
    }
}
