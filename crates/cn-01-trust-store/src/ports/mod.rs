//! # Ports
//!
//! - `outbound` - Configuration Store SPI

pub mod outbound;

pub use outbound::{ConfigStoreError, NamedKey, TrustConfig, TrustConfigStore};
