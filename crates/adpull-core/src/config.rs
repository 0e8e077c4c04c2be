//! Pacing and budget knobs for one fetch run.

use std::time::Duration;

use crate::retry::RetryConfig;

/// All tunables of the fetch pipeline.
///
/// Defaults mirror the production cadence against the reporting APIs: a
/// 15-second poll interval with a 40-attempt budget bounds any report job to
/// ten minutes, and the two-minute inter-chunk delay keeps per-account request
/// volume under the platform rate limits.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Rows requested per page on paginated endpoints.
    pub page_size: u32,
    /// Retry budget for each individual HTTP attempt.
    pub retry: RetryConfig,
    /// Cadence between report-job status polls.
    pub poll_interval: Duration,
    /// Maximum status polls before a job is declared timed out.
    pub max_poll_attempts: u32,
    /// Upper bound on the length of one time chunk, in days.
    pub max_chunk_days: u32,
    /// Chunk failures tolerated per account before remaining chunks are skipped.
    pub max_account_failures: u32,
    /// Accounts processed concurrently.
    pub worker_pool_size: usize,
    /// Sleep after each successfully fetched page.
    pub inter_page_delay: Duration,
    /// Sleep between consecutive time chunks of one account.
    pub inter_chunk_delay: Duration,
    /// Sleep between attribution-window sweeps within one chunk.
    pub inter_window_delay: Duration,
    /// Attribution windows fetched for every chunk.
    pub attribution_windows: Vec<String>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            page_size: 500,
            retry: RetryConfig::default(),
            poll_interval: Duration::from_secs(15),
            max_poll_attempts: 40,
            max_chunk_days: 560,
            max_account_failures: 3,
            worker_pool_size: 8,
            inter_page_delay: Duration::from_millis(200),
            inter_chunk_delay: Duration::from_secs(120),
            inter_window_delay: Duration::from_secs(1),
            attribution_windows: vec![String::from("7d_click")],
        }
    }
}

impl FetchPolicy {
    /// A policy with every delay zeroed and tight budgets, for tests.
    pub fn instant() -> Self {
        Self {
            retry: RetryConfig::immediate(2),
            poll_interval: Duration::ZERO,
            inter_page_delay: Duration::ZERO,
            inter_chunk_delay: Duration::ZERO,
            inter_window_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Worst-case wall-clock wait for a single report job.
    pub fn poll_budget(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_budget_bounds_worst_case_wait() {
        let policy = FetchPolicy {
            poll_interval: Duration::from_secs(15),
            max_poll_attempts: 40,
            ..FetchPolicy::default()
        };
        assert_eq!(policy.poll_budget(), Duration::from_secs(600));
    }
}
