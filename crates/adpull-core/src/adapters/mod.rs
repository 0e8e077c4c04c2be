//! Concrete reporting-platform protocol code over the [`HttpClient`] seam.

mod insights;
mod reporting;

pub use insights::InsightsAdapter;
pub use reporting::ReportingAdapter;

use serde_json::Value;

use crate::error::FetchError;
use crate::http::{HttpClient, HttpRequest};

/// Per-account access tokens with a default fallback.
#[derive(Debug, Clone, Default)]
pub struct AccountTokens {
    default: String,
    overrides: std::collections::HashMap<String, String>,
}

impl AccountTokens {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            overrides: std::collections::HashMap::new(),
        }
    }

    pub fn with_override(
        mut self,
        account_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.overrides.insert(account_id.into(), token.into());
        self
    }

    pub fn token_for(&self, account_id: &str) -> &str {
        self.overrides
            .get(account_id)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }
}

/// Executes one request and classifies the outcome: transport failures and
/// non-2xx statuses map onto the retryable side of the taxonomy (401/403 are
/// auth-fatal), an unparsable body is malformed and never retried.
pub(crate) async fn request_json(
    http: &dyn HttpClient,
    request: HttpRequest,
    account_id: &str,
) -> Result<Value, FetchError> {
    let response = http
        .execute(request)
        .await
        .map_err(|error| FetchError::transport(error.message()))?;

    if response.status == 401 || response.status == 403 {
        return Err(FetchError::auth(
            account_id,
            format!("upstream returned status {}", response.status),
        ));
    }
    if !response.is_success() {
        return Err(FetchError::api(
            response.status,
            truncate(&response.body, 200),
        ));
    }

    serde_json::from_str(&response.body)
        .map_err(|error| FetchError::malformed(format!("invalid json: {error}")))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
