use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw platform row as returned by a reporting API, before normalization.
pub type RawRecord = Map<String, Value>;

/// Entity identifier that is an integer when the source value is
/// unambiguously integral, and the original text otherwise.
///
/// Coercion never fails: a value that does not parse as an integer is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl EntityId {
    /// Coerces a raw JSON value into an id. Returns `None` for null and for
    /// values that have no textual identity (arrays, objects).
    pub fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number).or_else(|| {
                // Fractional ids do not exist upstream; keep the raw text.
                Some(Self::Text(n.to_string()))
            }),
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(parsed) => Some(Self::Number(parsed)),
                Err(_) => Some(Self::Text(s.clone())),
            },
            Value::Bool(b) => Some(Self::Text(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_key(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::coerce(&Value::String(value.to_owned()))
            .unwrap_or_else(|| Self::Text(value.to_owned()))
    }
}

/// Canonical output row.
///
/// Every field of the schema is always present in the serialized form;
/// values the source did not provide are explicit nulls, so downstream
/// consumers never have to special-case missing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub campaign_id: Option<EntityId>,
    pub campaign_name: Option<String>,
    pub adgroup_id: Option<EntityId>,
    pub adgroup_name: Option<String>,
    pub ad_id: Option<EntityId>,
    pub ad_name: Option<String>,
    pub account_id: Option<EntityId>,
    pub objective: Option<String>,
    pub status: Option<String>,
    pub date_start: Option<String>,
    pub date_stop: Option<String>,
    pub country: Option<String>,
    pub impressions: Option<i64>,
    pub clicks: Option<i64>,
    pub spend: Option<f64>,
    pub reach: Option<i64>,
    pub frequency: Option<f64>,
    pub purchases: Option<i64>,
    pub purchase_value: Option<f64>,
    pub post_shares: Option<i64>,
    pub view_content: Option<f64>,
    pub attribution_window: Option<String>,
    pub source_account_id: Option<EntityId>,
}

impl NormalizedRecord {
    /// A record with every field nulled; the normalizer fills what it can.
    pub fn empty() -> Self {
        Self {
            campaign_id: None,
            campaign_name: None,
            adgroup_id: None,
            adgroup_name: None,
            ad_id: None,
            ad_name: None,
            account_id: None,
            objective: None,
            status: None,
            date_start: None,
            date_stop: None,
            country: None,
            impressions: None,
            clicks: None,
            spend: None,
            reach: None,
            frequency: None,
            purchases: None,
            purchase_value: None,
            post_shares: None,
            view_content: None,
            attribution_window: None,
            source_account_id: None,
        }
    }
}
