use thiserror::Error;

/// Failure taxonomy for pipeline operations.
///
/// Transport and API errors are recovered locally via retry/backoff up to
/// their ceiling; exhaustion degrades to "no data for this unit" rather than
/// aborting the account. `Auth` is fatal to one account, `InvalidRange` is
/// fatal to the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("authentication failed for account {account_id}: {message}")]
    Auth { account_id: String, message: String },

    #[error("report job {job_id} exhausted {attempts} poll attempts")]
    JobTimeout { job_id: String, attempts: u32 },

    #[error("report job {job_id} ended as '{status}'")]
    JobFailed { job_id: String, status: String },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    pub fn auth(account_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            account_id: account_id.into(),
            message: message.into(),
        }
    }

    /// Whether another attempt at the same request may succeed.
    pub const fn retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Api { .. } => true,
            Self::MalformedPayload { .. }
            | Self::Auth { .. }
            | Self::JobTimeout { .. }
            | Self::JobFailed { .. }
            | Self::InvalidRange { .. } => false,
        }
    }

    /// Stable machine-readable code for logs and summaries.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "fetch.transport",
            Self::Api { .. } => "fetch.api",
            Self::MalformedPayload { .. } => "fetch.malformed_payload",
            Self::Auth { .. } => "fetch.auth",
            Self::JobTimeout { .. } => "fetch.job_timeout",
            Self::JobFailed { .. } => "fetch.job_failed",
            Self::InvalidRange { .. } => "fetch.invalid_range",
        }
    }
}
