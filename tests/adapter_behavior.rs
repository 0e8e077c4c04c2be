//! The two platform adapters driven end to end through the orchestrator,
//! over a scripted HTTP transport.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use adpull_core::{
    AccountTokens, DateRange, EntityId, FetchPolicy, HttpClient, HttpError, HttpRequest,
    HttpResponse, InsightsAdapter, Orchestrator, ReportingAdapter,
};

struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedHttpClient {
    fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn urls(&self) -> Vec<String> {
        self.requests.lock().expect("request log lock").clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request log lock")
            .push(request.url.clone());
        let next = self
            .responses
            .lock()
            .expect("response script lock")
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::ok_json("{}")));
        Box::pin(async move { next })
    }
}

fn range() -> DateRange {
    DateRange::parse("2024-03-01", "2024-03-02").expect("valid range")
}

fn policy() -> FetchPolicy {
    FetchPolicy::instant()
}

#[tokio::test]
async fn insights_adapter_runs_submit_poll_result_per_chunk() {
    let http = Arc::new(ScriptedHttpClient::new(vec![
        // validation
        Ok(HttpResponse::ok_json(r#"{"id": "act_42", "name": "Main"}"#)),
        // submit
        Ok(HttpResponse::ok_json(r#"{"report_run_id": "rr-1"}"#)),
        // polls
        Ok(HttpResponse::ok_json(
            r#"{"async_status": "Job Running", "async_percent_completion": 40}"#,
        )),
        Ok(HttpResponse::ok_json(
            r#"{"async_status": "Job Completed", "async_percent_completion": 100}"#,
        )),
        // result download
        Ok(HttpResponse::ok_json(
            r#"{"data": [
                {"ad_id": "901", "adset_id": "77", "adset_name": "Prospecting",
                 "campaign_name": "Spring", "date_start": "2024-03-01",
                 "date_stop": "2024-03-01", "country": "US",
                 "impressions": "50", "spend": "2.5",
                 "actions": [{"action_type": "purchase", "value": "2"}]}
            ]}"#,
        )),
    ]));

    let adapter = InsightsAdapter::new(http.clone(), AccountTokens::new("tok"), &policy());
    let output = Orchestrator::new(Arc::new(adapter), policy())
        .run(&[String::from("42")], range())
        .await;

    assert_eq!(output.summary.successful_accounts, vec!["42"]);
    assert_eq!(output.records.len(), 1);

    let record = &output.records[0];
    assert_eq!(record.ad_id, Some(EntityId::Number(901)));
    assert_eq!(record.adgroup_id, Some(EntityId::Number(77)));
    assert_eq!(record.adgroup_name.as_deref(), Some("Prospecting"));
    assert_eq!(record.campaign_name.as_deref(), Some("Spring"));
    assert_eq!(record.purchases, Some(2));
    assert_eq!(record.date_start.as_deref(), Some("2024-03-01T00:00:00Z"));

    let urls = http.urls();
    assert!(urls[0].contains("/act_42?fields=id,name"));
    assert!(urls[1].contains("/act_42/insights?"));
    assert!(urls[4].contains("/rr-1/insights"));
}

#[tokio::test]
async fn reporting_adapter_enriches_rows_from_metadata_listings() {
    fn envelope(body: &str) -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse::ok_json(format!(
            r#"{{"code": 0, "message": "OK", "data": {body}}}"#
        )))
    }

    let http = Arc::new(ScriptedHttpClient::new(vec![
        // validation
        envelope(r#"{"list": [{"advertiser_id": "777"}]}"#),
        // campaign, adgroup, ad listings
        envelope(
            r#"{"list": [{"campaign_id": "30", "campaign_name": "Spring Push",
                "objective_type": "CONVERSIONS"}],
                "page_info": {"page": 1, "total_page": 1}}"#,
        ),
        envelope(
            r#"{"list": [{"adgroup_id": "20", "adgroup_name": "Lookalikes"}],
                "page_info": {"page": 1, "total_page": 1}}"#,
        ),
        envelope(
            r#"{"list": [{"ad_id": "100", "ad_name": "Hero Video", "adgroup_id": "20",
                "campaign_id": "30", "operation_status": "ENABLE"}],
                "page_info": {"page": 1, "total_page": 1}}"#,
        ),
        // report rows
        envelope(
            r#"{"list": [{"dimensions": {"ad_id": "100", "stat_time_day": "2024-03-01",
                "country_code": "US"}, "metrics": {"spend": "9.5", "impressions": "300"}}],
                "page_info": {"page": 1, "total_page": 1}}"#,
        ),
    ]));

    let adapter = ReportingAdapter::new(http.clone(), AccountTokens::new("tok"), &policy());
    let output = Orchestrator::new(Arc::new(adapter), policy())
        .run(&[String::from("777")], range())
        .await;

    assert_eq!(output.summary.successful_accounts, vec!["777"]);
    assert_eq!(output.records.len(), 1);

    let record = &output.records[0];
    assert_eq!(record.ad_name.as_deref(), Some("Hero Video"));
    assert_eq!(record.campaign_name.as_deref(), Some("Spring Push"));
    assert_eq!(record.adgroup_name.as_deref(), Some("Lookalikes"));
    assert_eq!(record.objective.as_deref(), Some("CONVERSIONS"));
    assert_eq!(record.country.as_deref(), Some("US"));
    assert_eq!(record.spend, Some(9.5));
    assert_eq!(record.date_start.as_deref(), Some("2024-03-01T00:00:00Z"));

    let urls = http.urls();
    assert!(urls[0].contains("/advertiser/info/"));
    assert!(urls[4].contains("/report/integrated/get/"));
    assert!(urls[4].contains("start_date=2024-03-01"));
}
