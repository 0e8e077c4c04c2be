//! Multi-account fan-out with a bounded worker pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::account::{AccountResult, AccountStatus, AccountWorker};
use crate::config::FetchPolicy;
use crate::domain::{DateRange, EntityId, NormalizedRecord};
use crate::fetcher::PlatformClient;
use crate::fingerprint::Deduplicator;
use crate::normalize::NormalizeStats;

/// Aggregate outcome of one run across every requested account.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub successful_accounts: Vec<String>,
    pub partial_accounts: Vec<String>,
    pub failed_accounts: Vec<String>,
    pub total_records: usize,
    pub stats: NormalizeStats,
    #[serde(serialize_with = "serialize_elapsed_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    /// True when no account contributed any data at all.
    pub fn is_empty_run(&self) -> bool {
        self.total_records == 0
    }
}

fn serialize_elapsed_secs<S: serde::Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

/// Everything a run produces: the merged record stream plus its summary.
#[derive(Debug)]
pub struct RunOutput {
    pub records: Vec<NormalizedRecord>,
    pub summary: RunSummary,
}

/// Runs one account worker per requested account, at most
/// `worker_pool_size` in flight at a time.
///
/// Workers share one deduplicator, so a record emitted by two accounts is
/// admitted exactly once regardless of completion order. Each admitted record
/// is tagged with the account whose worker fetched it.
pub struct Orchestrator {
    client: Arc<dyn PlatformClient>,
    policy: FetchPolicy,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn PlatformClient>, policy: FetchPolicy) -> Self {
        Self { client, policy }
    }

    pub async fn run(&self, account_ids: &[String], range: DateRange) -> RunOutput {
        let started = Instant::now();
        let dedup = Arc::new(Deduplicator::new());
        let semaphore = Arc::new(Semaphore::new(self.policy.worker_pool_size.max(1)));
        let mut tasks = JoinSet::new();
        // Task id → account id, so a panicked worker still gets reported.
        let mut account_by_task = std::collections::HashMap::new();

        for account_id in account_ids {
            let account_id = account_id.clone();
            let range = range.clone();
            let semaphore = Arc::clone(&semaphore);
            let worker = AccountWorker::new(
                Arc::clone(&self.client),
                Arc::clone(&dedup),
                self.policy.clone(),
            );

            let task = tasks.spawn({
                let account_id = account_id.clone();
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("worker pool semaphore is never closed");
                    worker.run(&account_id, &range).await
                }
            });
            account_by_task.insert(task.id(), account_id);
        }

        let mut records = Vec::new();
        let mut summary = RunSummary {
            successful_accounts: Vec::new(),
            partial_accounts: Vec::new(),
            failed_accounts: Vec::new(),
            total_records: 0,
            stats: NormalizeStats::default(),
            elapsed: Duration::ZERO,
        };

        // Results arrive in completion order, not submission order.
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task_id, result)) => {
                    account_by_task.remove(&task_id);
                    self.absorb(result, &mut records, &mut summary);
                }
                Err(error) => {
                    let account_id = account_by_task
                        .remove(&error.id())
                        .unwrap_or_else(|| String::from("unknown"));
                    tracing::error!(
                        account_id = account_id.as_str(),
                        error = %error,
                        "account worker task panicked"
                    );
                    summary.failed_accounts.push(account_id);
                }
            }
        }

        summary.total_records = records.len();
        summary.elapsed = started.elapsed();
        summary.successful_accounts.sort();
        summary.partial_accounts.sort();
        summary.failed_accounts.sort();

        tracing::info!(
            successful = summary.successful_accounts.len(),
            partial = summary.partial_accounts.len(),
            failed = summary.failed_accounts.len(),
            records = summary.total_records,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "run finished"
        );

        RunOutput { records, summary }
    }

    fn absorb(
        &self,
        result: AccountResult,
        records: &mut Vec<NormalizedRecord>,
        summary: &mut RunSummary,
    ) {
        let AccountResult {
            account_id,
            status,
            records: fetched,
            failure_count,
            stats,
        } = result;

        tracing::info!(
            account_id = account_id.as_str(),
            ?status,
            records = fetched.len(),
            failure_count,
            "account worker finished"
        );

        let source = EntityId::from(account_id.as_str());
        records.extend(fetched.into_iter().map(|mut record| {
            record.source_account_id = Some(source.clone());
            record
        }));

        summary.stats.absorb(stats);
        match status {
            AccountStatus::Success => summary.successful_accounts.push(account_id),
            AccountStatus::PartialFailure => summary.partial_accounts.push(account_id),
            AccountStatus::Failed => summary.failed_accounts.push(account_id),
        }
    }
}
