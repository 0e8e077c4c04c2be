//! Submit-then-poll state machine for asynchronous report jobs.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::domain::{RawRecord, TimeChunk};
use crate::error::FetchError;

/// Lifecycle of one report job as observed through status polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    TimedOut,
}

impl JobStatus {
    /// Maps a platform status string onto the state machine. Anything the
    /// platform reports outside the terminal set keeps the job running.
    pub fn from_api_status(status: &str) -> Self {
        match status {
            "Job Completed" => Self::Completed,
            "Job Failed" => Self::Failed,
            "Job Skipped" => Self::Skipped,
            _ => Self::Running,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::TimedOut
        )
    }
}

/// Mutable view of one job, owned by the worker that submitted it and
/// mutated only by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub status: JobStatus,
    pub percent_complete: u8,
}

impl JobHandle {
    pub fn submitted(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            percent_complete: 0,
        }
    }
}

/// Raw status payload returned by one poll request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusSnapshot {
    pub status: String,
    pub percent_complete: u8,
}

/// Reporting-API seam for the async-report flow.
pub trait ReportJobApi: Send + Sync {
    /// Submits a report job for one account / time chunk / attribution
    /// window and returns the platform job id.
    fn submit_report<'a>(
        &'a self,
        account_id: &'a str,
        chunk: TimeChunk,
        attribution_window: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;

    /// Issues one status request for a previously submitted job. The account
    /// id selects the credential the job was submitted with.
    fn poll_status<'a>(
        &'a self,
        account_id: &'a str,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatusSnapshot, FetchError>> + Send + 'a>>;

    /// Downloads the finished report rows, under the same credential that
    /// submitted the job.
    fn fetch_result<'a>(
        &'a self,
        account_id: &'a str,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, FetchError>> + Send + 'a>>;
}

/// Proof that a job reached `Completed`. The payload is retrievable exactly
/// once: `into_records` consumes the token. Carries the account the job was
/// submitted for, so the download reuses that account's credential.
#[derive(Debug)]
pub struct CompletedJob {
    account_id: String,
    handle: JobHandle,
}

impl CompletedJob {
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub async fn into_records(self, api: &dyn ReportJobApi) -> Result<Vec<RawRecord>, FetchError> {
        api.fetch_result(&self.account_id, &self.handle.job_id).await
    }
}

/// Drives a submitted job to a terminal state on a fixed cadence.
///
/// A poll-request error never fails the job; it only consumes one unit of
/// the attempt budget. Worst-case wait is `max_attempts * interval`.
pub struct JobPoller<'a> {
    api: &'a dyn ReportJobApi,
    interval: Duration,
    max_attempts: u32,
}

impl<'a> JobPoller<'a> {
    pub fn new(api: &'a dyn ReportJobApi, interval: Duration, max_attempts: u32) -> Self {
        Self {
            api,
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn poll_to_completion(
        &self,
        account_id: &str,
        job_id: impl Into<String>,
    ) -> Result<CompletedJob, FetchError> {
        let mut handle = JobHandle::submitted(job_id);

        for attempt in 1..=self.max_attempts {
            match self.api.poll_status(account_id, &handle.job_id).await {
                Ok(snapshot) => {
                    handle.percent_complete = snapshot.percent_complete;
                    let status = JobStatus::from_api_status(&snapshot.status);
                    handle.status = status;
                    tracing::debug!(
                        job_id = %handle.job_id,
                        status = snapshot.status.as_str(),
                        percent = snapshot.percent_complete,
                        attempt,
                        max_attempts = self.max_attempts,
                        "report job poll"
                    );

                    match status {
                        JobStatus::Completed => {
                            return Ok(CompletedJob {
                                account_id: account_id.to_owned(),
                                handle,
                            })
                        }
                        JobStatus::Failed | JobStatus::Skipped => {
                            return Err(FetchError::JobFailed {
                                job_id: handle.job_id,
                                status: snapshot.status,
                            });
                        }
                        _ => {}
                    }
                }
                Err(error) => {
                    // Consumes budget only; the job itself may still be fine.
                    tracing::warn!(
                        job_id = %handle.job_id,
                        attempt,
                        error = %error,
                        "report job poll request failed"
                    );
                }
            }

            if attempt < self.max_attempts && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
        }

        handle.status = JobStatus::TimedOut;
        Err(FetchError::JobTimeout {
            job_id: handle.job_id,
            attempts: self.max_attempts,
        })
    }
}
