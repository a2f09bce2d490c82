//! # Node Configuration
//!
//! Loaded from a TOML file, then overridden from `CN_*` environment
//! variables. Every field has a default, so an empty file is a valid
//! configuration.
//!
//! ```toml
//! [node]
//! peer_name = "build-box"
//! free_slots = 4
//! max_threads = 8
//! scratch_dir = "/var/tmp/compilenet"
//! log_level = "info"
//!
//! [network]
//! listen = "0.0.0.0:9333"
//! peers = ["10.0.0.2:9333"]
//!
//! [[toolchains]]
//! version = "x86_64-linux-gnu-gcc-12.2"
//! compiler = "/usr/bin/gcc-12"
//!
//! [protocol]
//! outgoing_request_timeout_secs = 15
//! max_group_query_keys = 16
//!
//! [trust]
//! path = "trust.toml"
//! ```
//!
//! | Variable          | Overrides              |
//! |-------------------|------------------------|
//! | `CN_CONFIG`       | config file path       |
//! | `CN_PEER_NAME`    | `node.peer_name`       |
//! | `CN_FREE_SLOTS`   | `node.free_slots`      |
//! | `CN_SCRATCH_DIR`  | `node.scratch_dir`     |
//! | `CN_LOG_LEVEL`    | `node.log_level`       |
//! | `CN_LISTEN`       | `network.listen`       |
//! | `CN_TRUST_PATH`   | `trust.path`           |

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cn_02_slot_market::SlotMarketConfig;
use cn_03_job_exchange::{JobExchangeConfig, Toolchain};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "compilenet.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub network: NetworkSection,
    pub toolchains: Vec<ToolchainEntry>,
    pub protocol: ProtocolSection,
    pub trust: TrustSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub peer_name: String,
    /// Slots offered to other peers.
    pub free_slots: u32,
    pub max_threads: u16,
    pub scratch_dir: PathBuf,
    pub log_level: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            peer_name: String::new(),
            free_slots: 0,
            max_threads: u16::try_from(num_cpus::get()).unwrap_or(u16::MAX),
            scratch_dir: std::env::temp_dir().join("compilenet"),
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub listen: SocketAddr,
    /// Peers dialled at startup.
    pub peers: Vec<SocketAddr>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9333)),
            peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolchainEntry {
    pub version: String,
    pub compiler: PathBuf,
}

/// Overrides of the protocol policy constants. Unset fields keep the
/// library defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtocolSection {
    pub outgoing_request_timeout_secs: Option<u64>,
    pub incoming_request_timeout_secs: Option<u64>,
    pub outgoing_job_timeout_secs: Option<u64>,
    pub outgoing_job_compile_timeout_secs: Option<u64>,
    pub max_group_query_keys: Option<usize>,
    pub max_free_slots: Option<u32>,
    pub compress_job_data: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrustSection {
    pub path: PathBuf,
}

impl Default for TrustSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trust.toml"),
        }
    }
}

impl NodeConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Load from `CN_CONFIG` (or [`DEFAULT_CONFIG_PATH`]) and apply the
    /// process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("CN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CN_*` overrides looked up through `var`.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = var("CN_PEER_NAME") {
            self.node.peer_name = name;
        }
        if let Some(value) = var("CN_FREE_SLOTS") {
            self.node.free_slots = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CN_FREE_SLOTS",
                value,
            })?;
        }
        if let Some(dir) = var("CN_SCRATCH_DIR") {
            self.node.scratch_dir = dir.into();
        }
        if let Some(level) = var("CN_LOG_LEVEL") {
            self.node.log_level = level;
        }
        if let Some(value) = var("CN_LISTEN") {
            self.network.listen = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CN_LISTEN",
                value,
            })?;
        }
        if let Some(path) = var("CN_TRUST_PATH") {
            self.trust.path = path.into();
        }
        Ok(())
    }

    pub fn toolchains(&self) -> Vec<Toolchain> {
        self.toolchains
            .iter()
            .map(|t| Toolchain::new(t.version.clone(), t.compiler.clone()))
            .collect()
    }

    /// Library policy with this file's overrides applied.
    pub fn job_exchange(&self) -> JobExchangeConfig {
        let p = &self.protocol;
        let defaults = JobExchangeConfig::default();
        let secs = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_secs);
        JobExchangeConfig {
            outgoing_request_timeout: secs(
                p.outgoing_request_timeout_secs,
                defaults.outgoing_request_timeout,
            ),
            incoming_request_timeout: secs(
                p.incoming_request_timeout_secs,
                defaults.incoming_request_timeout,
            ),
            outgoing_job_timeout: secs(p.outgoing_job_timeout_secs, defaults.outgoing_job_timeout),
            outgoing_job_compile_timeout: secs(
                p.outgoing_job_compile_timeout_secs,
                defaults.outgoing_job_compile_timeout,
            ),
            max_group_query_keys: p
                .max_group_query_keys
                .unwrap_or(defaults.max_group_query_keys),
            compress_job_data: p.compress_job_data.unwrap_or(defaults.compress_job_data),
            slot_market: SlotMarketConfig {
                max_free_slots: p
                    .max_free_slots
                    .unwrap_or(defaults.slot_market.max_free_slots),
                ..defaults.slot_market.clone()
            },
            ..defaults
        }
    }
}
