//! Paginated-report adapter: integrated report rows plus the three metadata
//! listing endpoints that feed the normalizer's mapping tables.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::adapters::{request_json, AccountTokens};
use crate::config::FetchPolicy;
use crate::domain::{format_day, RawRecord, TimeChunk};
use crate::error::FetchError;
use crate::fetcher::PlatformClient;
use crate::http::{encode_query, HttpAuth, HttpClient, HttpRequest};
use crate::normalize::{AdInfo, CampaignInfo, MappingTables};
use crate::pagination::{Cursor, Page, PageFetcher, PageOutcome, PageSource};

const DEFAULT_BASE_URL: &str = "https://business-api.tiktok.com/open_api/v1.3";

const REPORT_PATH: &str = "/report/integrated/get/";
const CAMPAIGN_PATH: &str = "/campaign/get/";
const ADGROUP_PATH: &str = "/adgroup/get/";
const AD_PATH: &str = "/ad/get/";
const ADVERTISER_PATH: &str = "/advertiser/info/";

const REPORT_METRICS: &[&str] = &["impressions", "clicks", "spend", "reach", "frequency"];

/// Page-number-driven reporting client.
pub struct ReportingAdapter {
    http: Arc<dyn HttpClient>,
    tokens: AccountTokens,
    base_url: String,
    page_size: u32,
    fetcher: PageFetcher,
}

impl ReportingAdapter {
    pub fn new(http: Arc<dyn HttpClient>, tokens: AccountTokens, policy: &FetchPolicy) -> Self {
        Self {
            http,
            tokens,
            base_url: String::from(DEFAULT_BASE_URL),
            page_size: policy.page_size,
            fetcher: PageFetcher::new(policy.retry, policy.inter_page_delay),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn auth_for(&self, account_id: &str) -> HttpAuth {
        HttpAuth::Header {
            name: String::from("Access-Token"),
            value: self.tokens.token_for(account_id).to_owned(),
        }
    }

    async fn get_envelope(
        &self,
        account_id: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}?{}", self.base_url, path, encode_query(params));
        let payload = request_json(
            self.http.as_ref(),
            HttpRequest::get(url).with_auth(&self.auth_for(account_id)),
            account_id,
        )
        .await?;

        let code = payload.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown platform error");
            return Err(FetchError::api(200, format!("code {code}: {message}")));
        }
        Ok(payload)
    }

    async fn fetch_listing(
        &self,
        account_id: &str,
        path: &'static str,
        fields: &'static [&'static str],
    ) -> PageOutcome<Value> {
        let source = ListPages {
            adapter: self,
            account_id,
            path,
            extra: vec![(
                "fields",
                serde_json::to_string(fields).expect("static field list always serializes"),
            )],
        };
        self.fetcher.fetch_all(&source).await
    }
}

/// One paginated listing request, walked page by page.
struct ListPages<'a> {
    adapter: &'a ReportingAdapter,
    account_id: &'a str,
    path: &'static str,
    extra: Vec<(&'static str, String)>,
}

impl PageSource for ListPages<'_> {
    type Item = Value;

    fn fetch_page<'a>(
        &'a self,
        cursor: Option<&'a Cursor>,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Value>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let page = match cursor {
                Some(Cursor::PageNumber(n)) => *n,
                Some(Cursor::Bookmark(_)) | None => 1,
            };

            let mut params = vec![
                ("advertiser_id", self.account_id.to_owned()),
                ("page", page.to_string()),
                ("page_size", self.adapter.page_size.to_string()),
            ];
            params.extend(self.extra.iter().map(|(k, v)| (*k, v.clone())));

            let payload = self
                .adapter
                .get_envelope(self.account_id, self.path, &params)
                .await?;

            let data = payload.get("data").ok_or_else(|| {
                FetchError::malformed("listing response has no data object")
            })?;
            let items = data
                .get("list")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let total_pages = data
                .pointer("/page_info/total_page")
                .and_then(Value::as_u64)
                .unwrap_or(1) as u32;
            let next = (page < total_pages).then(|| Cursor::PageNumber(page + 1));

            Ok(Page { items, next })
        })
    }
}

impl PlatformClient for ReportingAdapter {
    fn validate_account<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let params = vec![("advertiser_ids", format!("[\"{account_id}\"]"))];
            self.get_envelope(account_id, ADVERTISER_PATH, &params)
                .await
                .map_err(|error| match error {
                    // A platform-level error during validation means the
                    // credential does not reach this account.
                    FetchError::Api { message, .. } => FetchError::auth(account_id, message),
                    other => other,
                })?;
            Ok(())
        })
    }

    fn fetch_mappings<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MappingTables, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let campaigns = self
                .fetch_listing(
                    account_id,
                    CAMPAIGN_PATH,
                    &["campaign_id", "campaign_name", "objective_type"],
                )
                .await;
            let adgroups = self
                .fetch_listing(account_id, ADGROUP_PATH, &["adgroup_id", "adgroup_name"])
                .await;
            let ads = self
                .fetch_listing(
                    account_id,
                    AD_PATH,
                    &[
                        "ad_id",
                        "ad_name",
                        "adgroup_id",
                        "campaign_id",
                        "operation_status",
                    ],
                )
                .await;

            for (name, outcome) in [
                ("campaign", campaigns.is_complete()),
                ("adgroup", adgroups.is_complete()),
                ("ad", ads.is_complete()),
            ] {
                if !outcome {
                    tracing::warn!(account_id, listing = name, "metadata listing truncated");
                }
            }

            Ok(build_mapping_tables(
                campaigns.into_items(),
                adgroups.into_items(),
                ads.into_items(),
            ))
        })
    }

    fn fetch_chunk<'a>(
        &'a self,
        account_id: &'a str,
        chunk: TimeChunk,
        attribution_window: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let source = ListPages {
                adapter: self,
                account_id,
                path: REPORT_PATH,
                extra: vec![
                    ("report_type", String::from("BASIC")),
                    ("data_level", String::from("AUCTION_AD")),
                    ("service_type", String::from("AUCTION")),
                    ("start_date", format_day(chunk.since)),
                    ("end_date", format_day(chunk.until)),
                    (
                        "metrics",
                        serde_json::to_string(REPORT_METRICS)
                            .expect("static metric list always serializes"),
                    ),
                    (
                        "dimensions",
                        String::from("[\"ad_id\",\"stat_time_day\",\"country_code\"]"),
                    ),
                    ("attribution_window", attribution_window.to_owned()),
                ],
            };

            match self.fetcher.fetch_all(&source).await {
                PageOutcome::Complete(rows) => Ok(flatten_report_rows(rows)),
                PageOutcome::Truncated { items, error } if !items.is_empty() => {
                    tracing::warn!(
                        account_id,
                        %chunk,
                        error = %error,
                        rows = items.len(),
                        "returning partial report rows"
                    );
                    Ok(flatten_report_rows(items))
                }
                PageOutcome::Truncated { error, .. } => Err(error),
            }
        })
    }
}

/// Merges a report row's `dimensions` and `metrics` objects into one flat
/// map in the pipeline's raw vocabulary: `stat_time_day` becomes both date
/// bounds and `country_code` becomes `country`.
fn flatten_report_rows(rows: Vec<Value>) -> Vec<RawRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let mut raw = RawRecord::new();
            for section in ["dimensions", "metrics"] {
                if let Some(object) = row.get(section).and_then(Value::as_object) {
                    for (key, value) in object {
                        match key.as_str() {
                            "stat_time_day" => {
                                raw.insert(String::from("date_start"), value.clone());
                                raw.insert(String::from("date_stop"), value.clone());
                            }
                            "country_code" => {
                                raw.insert(String::from("country"), value.clone());
                            }
                            other => {
                                raw.insert(other.to_owned(), value.clone());
                            }
                        }
                    }
                }
            }
            (!raw.is_empty()).then_some(raw)
        })
        .collect()
}

fn build_mapping_tables(
    campaigns: Vec<Value>,
    adgroups: Vec<Value>,
    ads: Vec<Value>,
) -> MappingTables {
    let mut maps = MappingTables::default();

    for campaign in &campaigns {
        if let Some(id) = id_key(campaign, "campaign_id") {
            maps.campaigns.insert(
                id,
                CampaignInfo {
                    name: text(campaign, "campaign_name"),
                    objective: text(campaign, "objective_type"),
                },
            );
        }
    }
    for adgroup in &adgroups {
        if let (Some(id), Some(name)) = (id_key(adgroup, "adgroup_id"), text(adgroup, "adgroup_name"))
        {
            maps.adgroups.insert(id, name);
        }
    }
    for ad in &ads {
        if let Some(id) = id_key(ad, "ad_id") {
            maps.ads.insert(
                id,
                AdInfo {
                    name: text(ad, "ad_name"),
                    adgroup_id: id_key(ad, "adgroup_id"),
                    campaign_id: id_key(ad, "campaign_id"),
                    status: text(ad, "operation_status"),
                },
            );
        }
    }

    maps
}

fn id_key(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
}
