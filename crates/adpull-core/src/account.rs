//! Per-account fetch worker: validation, metadata, then the chunk sweep.

use std::sync::Arc;

use crate::config::FetchPolicy;
use crate::domain::{DateRange, NormalizedRecord, TimeChunk};
use crate::error::FetchError;
use crate::fetcher::PlatformClient;
use crate::fingerprint::Deduplicator;
use crate::normalize::{NormalizeStats, RecordNormalizer};

/// How one account's sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    /// Every chunk produced data.
    Success,
    /// Some chunks failed or came back empty; whatever was fetched is kept.
    PartialFailure,
    /// The account never got past validation; no data was fetched.
    Failed,
}

/// One account's sweep outcome, partial data included.
#[derive(Debug)]
pub struct AccountResult {
    pub account_id: String,
    pub status: AccountStatus,
    pub records: Vec<NormalizedRecord>,
    pub failure_count: u32,
    pub stats: NormalizeStats,
}

impl AccountResult {
    fn failed(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_owned(),
            status: AccountStatus::Failed,
            records: Vec::new(),
            failure_count: 0,
            stats: NormalizeStats::default(),
        }
    }
}

/// Sweeps one account chunk by chunk, window by window.
///
/// A chunk counts as failed when any window errors out or when the whole
/// sweep of the chunk yields zero rows. Once the failure budget is spent the
/// remaining chunks are skipped and the partial result is returned.
pub struct AccountWorker {
    client: Arc<dyn PlatformClient>,
    dedup: Arc<Deduplicator>,
    policy: FetchPolicy,
}

impl AccountWorker {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        dedup: Arc<Deduplicator>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            client,
            dedup,
            policy,
        }
    }

    pub async fn run(&self, account_id: &str, range: &DateRange) -> AccountResult {
        if let Err(error) = self.client.validate_account(account_id).await {
            tracing::error!(account_id, error = %error, "account validation failed");
            return AccountResult::failed(account_id);
        }

        let maps = match self.client.fetch_mappings(account_id).await {
            Ok(maps) => maps,
            Err(error) => {
                // Records degrade to their raw names instead of aborting
                // the account.
                tracing::warn!(account_id, error = %error, "metadata fetch failed, continuing unenriched");
                Default::default()
            }
        };
        let mut normalizer = RecordNormalizer::new(maps);

        let chunks = range.split_into_chunks(self.policy.max_chunk_days);
        tracing::info!(account_id, chunks = chunks.len(), "starting account sweep");

        let mut records = Vec::new();
        let mut failure_count = 0u32;
        let mut auth_aborted = false;

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !self.policy.inter_chunk_delay.is_zero() {
                tokio::time::sleep(self.policy.inter_chunk_delay).await;
            }

            let fetched = match self
                .sweep_chunk(account_id, *chunk, &mut normalizer, &mut records)
                .await
            {
                Ok(fetched) => fetched,
                Err(error) => {
                    // The credential stopped working mid-sweep; re-sending it
                    // for later chunks cannot succeed.
                    tracing::error!(
                        account_id,
                        %chunk,
                        error = %error,
                        skipped_chunks = chunks.len() - index - 1,
                        "credential rejected mid-sweep, aborting remaining chunks"
                    );
                    failure_count += 1;
                    auth_aborted = true;
                    break;
                }
            };
            if fetched == 0 {
                failure_count += 1;
                tracing::warn!(
                    account_id,
                    %chunk,
                    failure_count,
                    "chunk produced no data"
                );
                if failure_count >= self.policy.max_account_failures {
                    tracing::error!(
                        account_id,
                        skipped_chunks = chunks.len() - index - 1,
                        "failure budget spent, skipping remaining chunks"
                    );
                    break;
                }
            }
        }

        let status = if failure_count == 0 && !auth_aborted {
            AccountStatus::Success
        } else {
            AccountStatus::PartialFailure
        };

        let stats = normalizer.stats();
        tracing::info!(
            account_id,
            records = stats.records,
            defaulted_fields = stats.defaulted_fields,
            mapping_misses = stats.mapping_misses,
            malformed_dates = stats.malformed_dates,
            "account sweep finished"
        );

        AccountResult {
            account_id: account_id.to_owned(),
            status,
            records,
            failure_count,
            stats,
        }
    }

    /// Fetches one chunk across every attribution window, normalizing and
    /// deduplicating as rows arrive. Returns the number of rows admitted. A
    /// window that fails is skipped and the sweep continues with the next
    /// one; only an auth rejection surfaces as an error, since it is fatal
    /// to the whole account.
    async fn sweep_chunk(
        &self,
        account_id: &str,
        chunk: TimeChunk,
        normalizer: &mut RecordNormalizer,
        records: &mut Vec<NormalizedRecord>,
    ) -> Result<usize, FetchError> {
        let mut admitted = 0usize;

        for (index, window) in self.policy.attribution_windows.iter().enumerate() {
            if index > 0 && !self.policy.inter_window_delay.is_zero() {
                tokio::time::sleep(self.policy.inter_window_delay).await;
            }

            let rows = match self.client.fetch_chunk(account_id, chunk, window).await {
                Ok(rows) => rows,
                Err(error @ FetchError::Auth { .. }) => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        account_id,
                        %chunk,
                        window = window.as_str(),
                        error = %error,
                        "window fetch failed, continuing with the next window"
                    );
                    continue;
                }
            };

            for raw in &rows {
                let record = normalizer.normalize(raw, account_id, window);
                if !self.dedup.is_duplicate(&record) {
                    records.push(record);
                    admitted += 1;
                }
            }
        }

        Ok(admitted)
    }
}
