//! # Adapters
//!
//! - `memory` - `InMemoryTrustConfigStore` for tests and embedding
//! - `toml_store` - `TomlTrustConfigStore` (feature `toml-store`)

mod memory;
#[cfg(feature = "toml-store")]
mod toml_store;

pub use memory::InMemoryTrustConfigStore;
#[cfg(feature = "toml-store")]
pub use toml_store::TomlTrustConfigStore;
