//! Async-report adapter: submit an insights job, poll it, download rows.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::adapters::{request_json, AccountTokens};
use crate::config::FetchPolicy;
use crate::domain::{format_day, RawRecord, TimeChunk};
use crate::error::FetchError;
use crate::fetcher::PlatformClient;
use crate::http::{encode_query, HttpAuth, HttpClient, HttpRequest};
use crate::job::{JobPoller, JobStatusSnapshot, ReportJobApi};
use crate::normalize::MappingTables;

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v19.0";

const REPORT_FIELDS: &[&str] = &[
    "adset_name",
    "adset_id",
    "campaign_id",
    "campaign_name",
    "ad_id",
    "ad_name",
    "account_id",
    "date_start",
    "date_stop",
    "impressions",
    "clicks",
    "spend",
    "reach",
    "frequency",
    "actions",
    "action_values",
    "objective",
];

/// Graph-style reporting client driving the submit → poll → result flow.
pub struct InsightsAdapter {
    http: Arc<dyn HttpClient>,
    tokens: AccountTokens,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl InsightsAdapter {
    pub fn new(http: Arc<dyn HttpClient>, tokens: AccountTokens, policy: &FetchPolicy) -> Self {
        Self {
            http,
            tokens,
            base_url: String::from(DEFAULT_BASE_URL),
            poll_interval: policy.poll_interval,
            max_poll_attempts: policy.max_poll_attempts,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn auth_for(&self, account_id: &str) -> HttpAuth {
        HttpAuth::BearerToken(self.tokens.token_for(account_id).to_owned())
    }
}

impl ReportJobApi for InsightsAdapter {
    fn submit_report<'a>(
        &'a self,
        account_id: &'a str,
        chunk: TimeChunk,
        attribution_window: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let time_range = serde_json::json!({
                "since": format_day(chunk.since),
                "until": format_day(chunk.until),
            });
            let fields = serde_json::to_string(REPORT_FIELDS)
                .expect("static field list always serializes");
            let query = encode_query(&[
                ("level", String::from("ad")),
                ("time_range", time_range.to_string()),
                ("time_increment", String::from("1")),
                ("fields", fields),
                (
                    "action_attribution_windows",
                    format!("[\"{attribution_window}\"]"),
                ),
                ("breakdowns", String::from("[\"country\"]")),
            ]);
            let url = format!("{}/act_{}/insights?{}", self.base_url, account_id, query);

            let payload = request_json(
                self.http.as_ref(),
                HttpRequest::post(url).with_auth(&self.auth_for(account_id)),
                account_id,
            )
            .await?;

            payload
                .get("report_run_id")
                .and_then(value_to_text)
                .ok_or_else(|| {
                    FetchError::malformed("report submission response has no report_run_id")
                })
        })
    }

    fn poll_status<'a>(
        &'a self,
        account_id: &'a str,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatusSnapshot, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!(
                "{}/{}?fields=async_status,async_percent_completion",
                self.base_url, job_id
            );
            let payload = request_json(
                self.http.as_ref(),
                HttpRequest::get(url).with_auth(&self.auth_for(account_id)),
                account_id,
            )
            .await?;

            let status = payload
                .get("async_status")
                .and_then(Value::as_str)
                .ok_or_else(|| FetchError::malformed("job status response has no async_status"))?
                .to_owned();
            let percent = payload
                .get("async_percent_completion")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .min(100) as u8;

            Ok(JobStatusSnapshot {
                status,
                percent_complete: percent,
            })
        })
    }

    fn fetch_result<'a>(
        &'a self,
        account_id: &'a str,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/{}/insights", self.base_url, job_id);
            let payload = request_json(
                self.http.as_ref(),
                HttpRequest::get(url).with_auth(&self.auth_for(account_id)),
                account_id,
            )
            .await?;

            let rows = payload
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| FetchError::malformed("job result response has no data array"))?;

            Ok(rows.iter().filter_map(flatten_insight_row).collect())
        })
    }
}

impl PlatformClient for InsightsAdapter {
    fn validate_account<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/act_{}?fields=id,name", self.base_url, account_id);
            request_json(
                self.http.as_ref(),
                HttpRequest::get(url).with_auth(&self.auth_for(account_id)),
                account_id,
            )
            .await?;
            Ok(())
        })
    }

    fn fetch_mappings<'a>(
        &'a self,
        _account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MappingTables, FetchError>> + Send + 'a>> {
        // Insight rows already carry campaign/adset/ad names; there is
        // nothing to enrich from separate metadata endpoints.
        Box::pin(async { Ok(MappingTables::default()) })
    }

    fn fetch_chunk<'a>(
        &'a self,
        account_id: &'a str,
        chunk: TimeChunk,
        attribution_window: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let job_id = self
                .submit_report(account_id, chunk, attribution_window)
                .await?;
            tracing::info!(account_id, %chunk, job_id = job_id.as_str(), "submitted report job");

            let poller = JobPoller::new(self, self.poll_interval, self.max_poll_attempts);
            let completed = poller.poll_to_completion(account_id, job_id).await?;
            completed.into_records(self).await
        })
    }
}

/// Maps one insight row into the pipeline's raw vocabulary. The platform's
/// `adset_*` keys become `adgroup_*`; everything else passes through.
fn flatten_insight_row(row: &Value) -> Option<RawRecord> {
    let object = row.as_object()?;
    let mut raw = RawRecord::new();
    for (key, value) in object {
        let key = match key.as_str() {
            "adset_id" => "adgroup_id",
            "adset_name" => "adgroup_name",
            other => other,
        };
        raw.insert(key.to_owned(), value.clone());
    }
    Some(raw)
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
