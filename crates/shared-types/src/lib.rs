//! # Shared Types Crate
//!
//! Identifiers and value types used across the CompileNet crates.
//!
//! ## Design Principles
//!
//! - **Opaque handles**: peers are addressed by [`PeerId`], never by a
//!   reference into transport-owned state. Disconnect invalidates the id by
//!   removal from whatever map holds it.
//! - **Toolchain compatibility lives here**: both the slot market and the job
//!   exchange must agree on what "compatible" means, so the predicate is
//!   defined once in [`toolchain`].

pub mod entities;
pub mod errors;
pub mod toolchain;

pub use entities::*;
pub use errors::*;
pub use toolchain::{check_compatibility, is_compatible, Compatibility, ToolchainVersion};
