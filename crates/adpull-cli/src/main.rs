mod cli;
mod error;
mod output;

use std::sync::Arc;

use adpull_core::{
    DateRange, InsightsAdapter, Orchestrator, PlatformClient, ReportingAdapter, ReqwestHttpClient,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, FetchMode};
use crate::error::CliError;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

#[tokio::main]
async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let range = DateRange::parse(&cli.since, &cli.until)?;
    let tokens = cli.tokens()?;
    let policy = cli.policy();

    let http = Arc::new(ReqwestHttpClient::new());
    let client: Arc<dyn PlatformClient> = match cli.mode {
        FetchMode::AsyncReport => Arc::new(InsightsAdapter::new(http, tokens, &policy)),
        FetchMode::Paginated => Arc::new(ReportingAdapter::new(http, tokens, &policy)),
    };

    let run_id = uuid::Uuid::new_v4();
    tracing::info!(
        %run_id,
        accounts = cli.accounts.len(),
        since = cli.since.as_str(),
        until = cli.until.as_str(),
        mode = ?cli.mode,
        "starting fetch run"
    );

    let output = Orchestrator::new(client, policy)
        .run(&cli.accounts, range)
        .await;

    let written = output::write_records(&cli.output, &output.records)?;
    tracing::info!(%run_id, written, path = %cli.output.display(), "record stream written");

    if cli.summary {
        println!("{}", serde_json::to_string_pretty(&output.summary)?);
    }

    if output.summary.is_empty_run() {
        return Err(CliError::EmptyRun);
    }
    Ok(())
}
