use std::io;
use std::path::PathBuf;

use cn_01_trust_store::TrustStoreError;
use thiserror::Error;

/// Errors the job exchange cannot recover from.
///
/// Protocol problems never show up here: they become replies, drops or job
/// results. What remains is local state the node itself owns going bad.
#[derive(Debug, Error)]
pub enum JobExchangeError {
    /// A privately owned job file could not be read or written.
    #[error("local file {} unusable: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No temporary file could be created for incoming job data.
    #[error("scratch space unusable: {0}")]
    Scratch(#[source] io::Error),

    #[error(transparent)]
    Trust(#[from] TrustStoreError),
}

impl JobExchangeError {
    pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}
