//! Zstd compression of job data file blobs.

use std::io::{self, Read};

use thiserror::Error;

const LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("zstd stream failed: {0}")]
    Stream(#[from] io::Error),
    #[error("decompressed file exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    Ok(zstd::encode_all(data, LEVEL)?)
}

/// Decompress at most `limit` bytes. Larger output is an error rather
/// than an allocation the peer gets to choose.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>, CompressionError> {
    let decoder = zstd::stream::Decoder::new(data)?;
    let mut output = Vec::new();
    decoder
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut output)?;
    if output.len() > limit {
        return Err(CompressionError::TooLarge { limit });
    }
    Ok(output)
}
