//! # Slot Market
//!
//! Tracks free compiler slots advertised by remote peers and hands them out
//! one at a time to the job request logic.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Aggregate count equals sum of live batches | every mutation adjusts both |
//! | Aggregate never exceeds `max_free_slots` | `record` clamps or rejects |
//! | `take` never returns an incompatible peer | compatibility checked per batch |
//! | Discarded peers are never returned | `discard` removes every batch |
//!
//! ## Selection Policy
//!
//! Batches are examined in uniformly random order so that no single
//! advertiser is drained first. A batch found incompatible with the
//! requested toolchain is dropped entirely. The generator is a seedable
//! `StdRng`: load spreading, not security.
//!
//! ## Example
//!
//! ```rust
//! use cn_02_slot_market::{FreeCompilerSlots, SlotMarket, SlotMarketConfig};
//! use shared_types::PeerId;
//!
//! let mut market = SlotMarket::with_seed(SlotMarketConfig::default(), 42);
//! market.record(FreeCompilerSlots::new(PeerId(1), 2, vec!["x86_64-gcc-4.6".into()]));
//!
//! assert_eq!(market.take("x86_64-gcc-4.6"), Some(PeerId(1)));
//! assert_eq!(market.free_slot_count(), 1);
//! ```

pub mod domain;

pub use domain::{FreeCompilerSlots, RecordOutcome, SlotMarket, SlotMarketConfig};
