//! Merges raw metric rows with auxiliary id-to-name mappings into the
//! canonical schema.
//!
//! Normalization is total: no input makes it raise. Missing mappings fall
//! back to whatever the raw row carried, then to null; coercion failures keep
//! the original value; malformed dates pass through untouched. What did get
//! defaulted is counted in [`NormalizeStats`] so the fallbacks stay visible.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::domain::{parse_day, EntityId, NormalizedRecord, RawRecord};

/// Campaign attributes resolved from the metadata endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignInfo {
    pub name: Option<String>,
    pub objective: Option<String>,
}

/// Ad attributes resolved from the metadata endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdInfo {
    pub name: Option<String>,
    pub adgroup_id: Option<String>,
    pub campaign_id: Option<String>,
    pub status: Option<String>,
}

/// The three auxiliary lookup tables, keyed by stringified entity id.
#[derive(Debug, Clone, Default)]
pub struct MappingTables {
    pub campaigns: HashMap<String, CampaignInfo>,
    pub adgroups: HashMap<String, String>,
    pub ads: HashMap<String, AdInfo>,
}

/// Fallback counters accumulated across one worker's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub records: u64,
    /// Canonical fields that ended up null.
    pub defaulted_fields: u64,
    /// Id lookups that found nothing in the mapping tables.
    pub mapping_misses: u64,
    /// Date strings left untouched because they did not parse.
    pub malformed_dates: u64,
}

impl NormalizeStats {
    /// Folds another worker's counters into this one.
    pub fn absorb(&mut self, other: NormalizeStats) {
        self.records += other.records;
        self.defaulted_fields += other.defaulted_fields;
        self.mapping_misses += other.mapping_misses;
        self.malformed_dates += other.malformed_dates;
    }
}

/// Stateful normalizer for one account's rows.
#[derive(Debug, Default)]
pub struct RecordNormalizer {
    maps: MappingTables,
    stats: NormalizeStats,
}

impl RecordNormalizer {
    pub fn new(maps: MappingTables) -> Self {
        Self {
            maps,
            stats: NormalizeStats::default(),
        }
    }

    pub const fn stats(&self) -> NormalizeStats {
        self.stats
    }

    /// Produces one canonical record. Never fails.
    pub fn normalize(
        &mut self,
        raw: &RawRecord,
        account_id: &str,
        attribution_window: &str,
    ) -> NormalizedRecord {
        let mut record = NormalizedRecord::empty();

        let ad_id = raw.get("ad_id").and_then(EntityId::coerce);
        let ad_info = ad_id
            .as_ref()
            .and_then(|id| self.maps.ads.get(&id.as_key()))
            .cloned();
        if ad_id.is_some() && ad_info.is_none() {
            self.stats.mapping_misses += 1;
        }
        let ad_info = ad_info.unwrap_or_default();

        record.ad_id = ad_id;
        record.ad_name = ad_info.name.or_else(|| text_field(raw, "ad_name"));

        let campaign_key = ad_info
            .campaign_id
            .clone()
            .or_else(|| text_field(raw, "campaign_id"));
        let campaign_info = campaign_key
            .as_deref()
            .and_then(|key| self.maps.campaigns.get(key))
            .cloned()
            .unwrap_or_default();

        record.campaign_id = campaign_key
            .map(|key| EntityId::from(key.as_str()))
            .or_else(|| raw.get("campaign_id").and_then(EntityId::coerce));
        record.campaign_name = campaign_info
            .name
            .or_else(|| text_field(raw, "campaign_name"));
        record.objective = campaign_info
            .objective
            .or_else(|| text_field(raw, "objective"));

        let adgroup_key = ad_info
            .adgroup_id
            .clone()
            .or_else(|| text_field(raw, "adgroup_id"));
        record.adgroup_name = adgroup_key
            .as_deref()
            .and_then(|key| self.maps.adgroups.get(key))
            .cloned()
            .or_else(|| text_field(raw, "adgroup_name"));
        record.adgroup_id = adgroup_key.map(|key| EntityId::from(key.as_str()));

        record.status = ad_info.status.or_else(|| text_field(raw, "status"));

        record.account_id = raw
            .get("account_id")
            .and_then(EntityId::coerce)
            .or_else(|| Some(EntityId::from(account_id)));

        record.date_start = self.normalize_date(text_field(raw, "date_start"));
        record.date_stop = self.normalize_date(text_field(raw, "date_stop"));
        record.country = text_field(raw, "country");

        record.impressions = int_field(raw, "impressions");
        record.clicks = int_field(raw, "clicks");
        record.reach = int_field(raw, "reach");
        record.spend = float_field(raw, "spend");
        record.frequency = float_field(raw, "frequency");

        self.lift_actions(raw, &mut record);

        record.attribution_window = Some(attribution_window.to_owned());

        self.stats.records += 1;
        self.stats.defaulted_fields += count_nulls(&record);
        record
    }

    /// Scans the `actions` / `action_values` lists and lifts known action
    /// types into top-level metrics. Absent tags default to zero, mirroring
    /// what the platform reports for rows without conversions.
    fn lift_actions(&mut self, raw: &RawRecord, record: &mut NormalizedRecord) {
        record.purchases = Some(0);
        record.purchase_value = Some(0.0);
        record.post_shares = Some(0);
        record.view_content = Some(0.0);

        if let Some(Value::Array(actions)) = raw.get("actions") {
            for action in actions {
                let Some(kind) = action.get("action_type").and_then(Value::as_str) else {
                    continue;
                };
                let value = action.get("value");
                match kind {
                    "purchase" => record.purchases = value.and_then(to_i64).or(record.purchases),
                    "post" => record.post_shares = value.and_then(to_i64).or(record.post_shares),
                    "view_content" => {
                        record.view_content = value.and_then(to_f64).or(record.view_content)
                    }
                    _ => {}
                }
            }
        }

        if let Some(Value::Array(action_values)) = raw.get("action_values") {
            for action in action_values {
                let Some(kind) = action.get("action_type").and_then(Value::as_str) else {
                    continue;
                };
                let value = action.get("value");
                match kind {
                    "purchase" => {
                        record.purchase_value = value.and_then(to_f64).or(record.purchase_value)
                    }
                    "view_content" => {
                        record.view_content = value.and_then(to_f64).or(record.view_content)
                    }
                    _ => {}
                }
            }
        }
    }

    /// Rewrites a date-only string to a midnight-UTC timestamp. Anything
    /// that is not a plain `YYYY-MM-DD` day passes through unchanged.
    fn normalize_date(&mut self, value: Option<String>) -> Option<String> {
        let value = value?;
        if parse_day(&value).is_ok() {
            return Some(format!("{value}T00:00:00Z"));
        }
        if !looks_like_timestamp(&value) {
            self.stats.malformed_dates += 1;
        }
        Some(value)
    }
}

fn looks_like_timestamp(value: &str) -> bool {
    value.contains('T')
}

fn text_field(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(raw: &RawRecord, key: &str) -> Option<i64> {
    raw.get(key).and_then(to_i64)
}

fn float_field(raw: &RawRecord, key: &str) -> Option<f64> {
    raw.get(key).and_then(to_f64)
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn count_nulls(record: &NormalizedRecord) -> u64 {
    // source_account_id is tagged later by the orchestrator; it is not a
    // normalization fallback.
    let value = serde_json::to_value(record).expect("normalized record always serializes");
    value
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter(|(key, value)| value.is_null() && *key != "source_account_id")
                .count() as u64
        })
        .unwrap_or(0)
}
