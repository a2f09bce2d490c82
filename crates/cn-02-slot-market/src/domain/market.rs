use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::PeerId;
use tracing::debug;

use super::config::SlotMarketConfig;
use super::entities::{FreeCompilerSlots, RecordOutcome};

/// Remote free-slot bookkeeping.
#[derive(Debug)]
pub struct SlotMarket {
    config: SlotMarketConfig,
    batches: Vec<FreeCompilerSlots>,
    free_slot_count: u32,
    high_water_mark: u32,
    rng: StdRng,
}

impl SlotMarket {
    /// Create a market seeded from OS entropy.
    pub fn new(config: SlotMarketConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a market with a fixed seed for reproducible selection.
    pub fn with_seed(config: SlotMarketConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: SlotMarketConfig, rng: StdRng) -> Self {
        Self {
            config,
            batches: Vec::new(),
            free_slot_count: 0,
            high_water_mark: 0,
            rng,
        }
    }

    /// Add an advertisement.
    ///
    /// The batch is capped at `max_slots_per_advertisement` and clamped so
    /// the aggregate stays within `max_free_slots`. On success the high-water
    /// mark becomes the new aggregate.
    pub fn record(&mut self, mut batch: FreeCompilerSlots) -> RecordOutcome {
        if batch.slot_count == 0 {
            return RecordOutcome::IgnoredEmpty;
        }
        if self.free_slot_count >= self.config.max_free_slots {
            debug!(node = %batch.node, free = self.free_slot_count, "Slot ceiling reached, advertisement dropped");
            return RecordOutcome::RejectedCeiling;
        }

        let room = self.config.max_free_slots - self.free_slot_count;
        let accepted = batch
            .slot_count
            .min(self.config.max_slots_per_advertisement)
            .min(room);
        batch.slot_count = accepted;

        self.batches.push(batch);
        self.free_slot_count += accepted;
        self.high_water_mark = self.free_slot_count;
        RecordOutcome::Recorded { accepted }
    }

    /// Claim one slot compatible with `toolchain`.
    ///
    /// Batches are examined in random order. An incompatible batch is
    /// purged on the spot.
    pub fn take(&mut self, toolchain: &str) -> Option<PeerId> {
        while !self.batches.is_empty() {
            let index = self.rng.gen_range(0..self.batches.len());
            let batch = &mut self.batches[index];

            if batch.supports(toolchain) {
                let node = batch.node;
                batch.slot_count -= 1;
                self.free_slot_count -= 1;
                if batch.slot_count == 0 {
                    self.batches.swap_remove(index);
                }
                return Some(node);
            }

            let purged = self.batches.swap_remove(index);
            self.free_slot_count -= purged.slot_count;
            debug!(node = %purged.node, %toolchain, "Purged incompatible slot batch");
        }
        None
    }

    /// Drop every batch advertised by `node`. Returns the slots removed.
    pub fn discard(&mut self, node: PeerId) -> u32 {
        let mut removed = 0;
        self.batches.retain(|batch| {
            if batch.node == node {
                removed += batch.slot_count;
                false
            } else {
                true
            }
        });
        self.free_slot_count -= removed;
        removed
    }

    pub fn free_slot_count(&self) -> u32 {
        self.free_slot_count
    }

    /// Aggregate count right after the most recent accepted advertisement.
    pub fn high_water_mark(&self) -> u32 {
        self.high_water_mark
    }

    /// Whether supply has drained far enough to ask peers again.
    pub fn needs_refill(&self) -> bool {
        let divisor = self.config.refill_divisor.max(1);
        self.free_slot_count <= self.high_water_mark / divisor
    }

    /// Slots currently held for `node`.
    pub fn slots_for(&self, node: PeerId) -> u32 {
        self.batches
            .iter()
            .filter(|b| b.node == node)
            .map(|b| b.slot_count)
            .sum()
    }

    pub fn batches(&self) -> &[FreeCompilerSlots] {
        &self.batches
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn config(&self) -> &SlotMarketConfig {
        &self.config
    }
}
