use std::time::Duration;

use cn_02_slot_market::SlotMarketConfig;

/// Policy constants of the job exchange.
#[derive(Debug, Clone)]
pub struct JobExchangeConfig {
    /// Wait for `JobRequestAccepted` / `JobRequestRejected`.
    pub outgoing_request_timeout: Duration,
    /// Wait for `JobData` after accepting a request.
    pub incoming_request_timeout: Duration,
    /// Wait for `JobDataReceived` after shipping a job.
    pub outgoing_job_timeout: Duration,
    /// Wait for `JobFinished` once the peer acknowledged the data.
    pub outgoing_job_compile_timeout: Duration,
    /// Group keys listed in, and read from, a group slot query.
    pub max_group_query_keys: usize,
    /// Zstd-compress job data file blobs.
    pub compress_job_data: bool,
    /// Upper bound on one decompressed job data file.
    pub max_decompressed_file_size: usize,
    pub slot_market: SlotMarketConfig,
}

impl Default for JobExchangeConfig {
    fn default() -> Self {
        Self {
            outgoing_request_timeout: Duration::from_secs(15),
            incoming_request_timeout: Duration::from_secs(60),
            outgoing_job_timeout: Duration::from_secs(60),
            outgoing_job_compile_timeout: Duration::from_secs(120),
            max_group_query_keys: 16,
            compress_job_data: true,
            max_decompressed_file_size: 256 * 1024 * 1024,
            slot_market: SlotMarketConfig::default(),
        }
    }
}

impl JobExchangeConfig {
    /// Same timeouts, smaller limits.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            max_decompressed_file_size: 1024 * 1024,
            slot_market: SlotMarketConfig::for_testing(),
            ..Self::default()
        }
    }
}
