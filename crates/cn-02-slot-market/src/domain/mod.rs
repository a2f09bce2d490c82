//! Slot market domain.

// Semantic submodules
mod config;
mod entities;
mod market;

// Re-export public API
pub use config::SlotMarketConfig;
pub use entities::{FreeCompilerSlots, RecordOutcome};
pub use market::SlotMarket;
