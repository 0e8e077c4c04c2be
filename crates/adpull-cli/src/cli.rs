use std::path::PathBuf;
use std::time::Duration;

use adpull_core::{AccountTokens, FetchPolicy};
use clap::{Parser, ValueEnum};

use crate::error::CliError;

/// Which platform protocol serves the report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Submit an asynchronous report job per chunk, poll it to completion.
    AsyncReport,
    /// Walk a paginated report endpoint page by page.
    Paginated,
}

#[derive(Debug, Parser)]
#[command(name = "adpull", about = "Pulls ad-platform metrics into JSONL", version)]
pub struct Cli {
    /// Account ids to fetch, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub accounts: Vec<String>,

    /// First day of the report range, YYYY-MM-DD.
    #[arg(long)]
    pub since: String,

    /// Last day of the report range, inclusive, YYYY-MM-DD.
    #[arg(long)]
    pub until: String,

    /// Default access token for every account.
    #[arg(long, env = "ADPULL_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Per-account token override, as `account_id=token`. Repeatable.
    #[arg(long = "account-token", value_name = "ID=TOKEN")]
    pub account_tokens: Vec<String>,

    /// Where the JSONL record stream is written.
    #[arg(long, short)]
    pub output: PathBuf,

    /// Platform protocol to fetch with.
    #[arg(long, value_enum, default_value_t = FetchMode::AsyncReport)]
    pub mode: FetchMode,

    /// Accounts processed concurrently.
    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    /// Upper bound on one time chunk, in days.
    #[arg(long, default_value_t = 560)]
    pub chunk_days: u32,

    /// Rows per page on paginated endpoints.
    #[arg(long, default_value_t = 500)]
    pub page_size: u32,

    /// Chunk failures tolerated per account before the rest are skipped.
    #[arg(long, default_value_t = 3)]
    pub max_failures: u32,

    /// Attribution windows swept per chunk, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "7d_click")]
    pub attribution_windows: Vec<String>,

    /// Seconds to sleep between consecutive chunks of one account.
    #[arg(long, default_value_t = 120)]
    pub chunk_delay_secs: u64,

    /// Print the run summary as JSON on stdout when done.
    #[arg(long)]
    pub summary: bool,
}

impl Cli {
    pub fn policy(&self) -> FetchPolicy {
        FetchPolicy {
            page_size: self.page_size,
            max_chunk_days: self.chunk_days,
            max_account_failures: self.max_failures,
            worker_pool_size: self.workers,
            inter_chunk_delay: Duration::from_secs(self.chunk_delay_secs),
            attribution_windows: self.attribution_windows.clone(),
            ..FetchPolicy::default()
        }
    }

    pub fn tokens(&self) -> Result<AccountTokens, CliError> {
        let mut tokens = AccountTokens::new(&self.access_token);
        for entry in &self.account_tokens {
            let (account_id, token) = entry.split_once('=').ok_or_else(|| {
                CliError::InvalidArgument(format!(
                    "token override `{entry}` is not of the form ID=TOKEN"
                ))
            })?;
            tokens = tokens.with_override(account_id, token);
        }
        Ok(tokens)
    }
}
