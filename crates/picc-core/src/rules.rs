//! Smart-folder rule engine.
//!
//! A folder's `query_rules` is stored as free-form JSON:
//!
//! ```json
//! { "filters": [ { "field": "tags", "operator": "contains", "value": "elder" } ] }
//! ```
//!
//! Each raw `{field, operator, value}` tuple is lowered into a closed
//! [`Filter`] enum. Shapes outside the supported set become
//! [`Filter::Unrecognized`], which never matches. A record belongs to a
//! folder iff every filter matches.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::ser::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::models::{MediaRecord, SmartFolder};

/// One supported `(field, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `tags contains X`
    TagsContains(String),
    /// `tags contains_any [X, Y, ...]`
    TagsContainsAny(Vec<String>),
    /// `tags empty`
    TagsEmpty,
    /// `quality_score >= N`; a missing score counts as 0.
    QualityAtLeast(f64),
    /// `created_at >= start_of_month`, resolved at evaluation time.
    CreatedSinceStartOfMonth,
    /// Anything else. Kept verbatim so it can be shown back to editors.
    Unrecognized(Value),
}

impl Filter {
    /// Lower one raw filter object. Never fails.
    pub fn from_json(raw: &Value) -> Self {
        let field = raw.get("field").and_then(Value::as_str);
        let operator = raw.get("operator").and_then(Value::as_str);
        let value = raw.get("value").unwrap_or(&Value::Null);

        let parsed = match (field, operator) {
            (Some("tags"), Some("contains")) => value.as_str().map(|s| Filter::TagsContains(s.to_string())),
            (Some("tags"), Some("contains_any")) => value.as_array().map(|items| {
                Filter::TagsContainsAny(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                )
            }),
            (Some("tags"), Some("empty")) => Some(Filter::TagsEmpty),
            (Some("quality_score"), Some(">=")) => number_value(value).map(Filter::QualityAtLeast),
            (Some("created_at"), Some(">=")) if value.as_str() == Some("start_of_month") => {
                Some(Filter::CreatedSinceStartOfMonth)
            }
            _ => None,
        };

        parsed.unwrap_or_else(|| Filter::Unrecognized(raw.clone()))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::TagsContains(tag) => json!({"field": "tags", "operator": "contains", "value": tag}),
            Filter::TagsContainsAny(tags) => {
                json!({"field": "tags", "operator": "contains_any", "value": tags})
            }
            Filter::TagsEmpty => json!({"field": "tags", "operator": "empty"}),
            Filter::QualityAtLeast(n) => json!({"field": "quality_score", "operator": ">=", "value": n}),
            Filter::CreatedSinceStartOfMonth => {
                json!({"field": "created_at", "operator": ">=", "value": "start_of_month"})
            }
            Filter::Unrecognized(raw) => raw.clone(),
        }
    }

    pub fn matches(&self, record: &MediaRecord, now: DateTime<Utc>) -> bool {
        match self {
            Filter::TagsContains(tag) => record.has_tag(tag),
            Filter::TagsContainsAny(tags) => tags.iter().any(|t| record.has_tag(t)),
            Filter::TagsEmpty => record.tags.as_ref().map(Vec::is_empty).unwrap_or(true),
            Filter::QualityAtLeast(min) => record.quality_score.unwrap_or(0.0) >= *min,
            Filter::CreatedSinceStartOfMonth => match start_of_month(now) {
                Some(start) => record.created_at >= start,
                None => false,
            },
            Filter::Unrecognized(_) => false,
        }
    }
}

/// Numbers, or strings holding numbers (the admin UI stores both).
fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First instant of `now`'s calendar month, UTC.
pub fn start_of_month(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).single()
}

/// Ordered filter list; combined with logical AND.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRules {
    pub filters: Vec<Filter>,
}

impl QueryRules {
    /// Parse stored rules. `None` when there is no `filters` array.
    pub fn from_json(raw: &Value) -> Option<Self> {
        let filters = raw.get("filters")?.as_array()?;
        Some(Self {
            filters: filters.iter().map(Filter::from_json).collect(),
        })
    }

    pub fn to_json(&self) -> Value {
        json!({ "filters": self.filters.iter().map(Filter::to_json).collect::<Vec<_>>() })
    }

    pub fn matches(&self, record: &MediaRecord, now: DateTime<Utc>) -> bool {
        self.filters.iter().all(|f| f.matches(record, now))
    }
}

impl Serialize for QueryRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Whether `record` belongs to `folder` at time `now`.
pub fn matches(folder: &SmartFolder, record: &MediaRecord, now: DateTime<Utc>) -> bool {
    folder
        .query_rules
        .as_ref()
        .map(|rules| rules.matches(record, now))
        .unwrap_or(false)
}

pub fn filter_matches<'a>(
    folder: &SmartFolder,
    records: &'a [MediaRecord],
    now: DateTime<Utc>,
) -> Vec<&'a MediaRecord> {
    records.iter().filter(|r| matches(folder, r, now)).collect()
}

pub fn count_matches(folder: &SmartFolder, records: &[MediaRecord], now: DateTime<Utc>) -> usize {
    records.iter().filter(|r| matches(folder, r, now)).count()
}
