//! # CompileNet Node
//!
//! `compilenet-node [CONFIG]` runs a node until ctrl-c. The config path
//! defaults to `$CN_CONFIG`, then `compilenet.toml`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cn_01_trust_store::{TomlTrustConfigStore, TrustConfigStore, TrustStore};
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn load_config() -> Result<NodeConfig> {
    let mut config = match std::env::args_os().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            NodeConfig::load(&path).with_context(|| format!("loading {}", path.display()))?
        }
        None => return NodeConfig::from_env().context("loading node config"),
    };
    config
        .apply_overrides(|key| std::env::var(key).ok())
        .context("applying environment overrides")?;
    Ok(config)
}

fn init_logging(default_level: &str) -> Result<()> {
    // RUST_LOG wins over the config file.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_trust(store: &dyn TrustConfigStore, peer_name: &str) -> Result<TrustStore> {
    let stored = store.load().context("loading trust file")?;
    let (mut trust, report) = TrustStore::from_config(&stored);
    if report.skipped_entries > 0 {
        warn!(skipped = report.skipped_entries, "Ignored trust entries with bad keys");
    }
    let renamed = !peer_name.is_empty() && trust.peer_name() != peer_name;
    if renamed {
        trust.set_peer_name(peer_name);
    }
    if report.regenerated_identity || renamed {
        if report.regenerated_identity {
            info!("Generated a new node identity");
        }
        store
            .save(&trust.to_config()?)
            .context("saving trust file")?;
    }
    Ok(trust)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.node.log_level)?;

    let trust_store = Arc::new(TomlTrustConfigStore::new(&config.trust.path));
    let trust = load_trust(trust_store.as_ref(), &config.node.peer_name)?;

    let runtime = NodeRuntime::start(&config, trust, trust_store).await?;
    let handle = runtime.handle();
    info!(listen = %handle.listen_addr(), "Node is running. Press Ctrl+C to stop.");

    for addr in &config.network.peers {
        let handle = handle.clone();
        let addr = *addr;
        tokio::spawn(async move {
            if let Err(e) = handle.connect(addr).await {
                warn!(%addr, error = %e, "Could not reach configured peer");
            }
        });
    }

    let stopper = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Initiating graceful shutdown...");
        }
        stopper.shutdown();
    });

    runtime.run().await
}
