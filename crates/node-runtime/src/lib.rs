//! # CompileNet Node Runtime
//!
//! Hosts one [`JobExchangeService`](cn_03_job_exchange::JobExchangeService)
//! on tokio with production adapters: TCP links to peers, compiler
//! subprocesses, a scratch directory and TOML-persisted trust data.
//!
//! ## Modules
//!
//! - `config` - node TOML file and `CN_*` environment overrides
//! - `adapters` - driven port implementations
//! - `runtime` - the event loop and [`NodeHandle`]
//!
//! ## Startup Sequence
//!
//! 1. Load [`NodeConfig`]
//! 2. Load the trust file; persist it again if a new identity was made
//! 3. [`NodeRuntime::start`] binds the listener and configures the service
//! 4. Dial the configured peers through the [`NodeHandle`]
//! 5. [`NodeRuntime::run`] until ctrl-c

pub mod adapters;
pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use runtime::{Command, NodeHandle, NodeRuntime, NodeService, TICK_INTERVAL};
