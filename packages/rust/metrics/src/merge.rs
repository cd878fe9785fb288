//! Provider response decoding and cross-batch merging.
//!
//! A batch body is a JSON object mapping the provider's keyword key to either
//! a metrics record or `null`. Null and malformed entries are dropped here so
//! later stages only ever see well-formed records. Entries keep the order
//! they had in the provider's body, batch after batch.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;
use tracing::{debug, error, warn};

use keyplan_shared::{KeyplanError, Result};

/// Raw provider key → record, unioned across all batches of one run, in provider order.
pub type MetricsMap = IndexMap<String, MetricsRecord>;

/// One keyword's metrics as reported by the provider.
///
/// Bid ranges and the competition index are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    #[serde(default, deserialize_with = "search_count")]
    pub avg_monthly_searches: Option<u64>,
    #[serde(default)]
    pub competition_level: Option<String>,
}

/// Search counts arrive as numbers, or as strings when the upstream API
/// encodes int64 values that way.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchCount {
    Int(u64),
    Float(f64),
    Text(String),
}

fn search_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SearchCount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SearchCount::Int(n)) => Ok(Some(n)),
        Some(SearchCount::Float(f)) if f.is_finite() && f >= 0.0 => Ok(Some(f.round() as u64)),
        Some(SearchCount::Float(f)) => Err(de::Error::custom(format!("invalid search count {f}"))),
        Some(SearchCount::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid search count '{s}': {e}"))),
    }
}

/// Decode one batch body, keeping only well-formed records.
pub fn parse_batch(body: &str) -> Result<MetricsMap> {
    let entries: IndexMap<String, Value> = serde_json::from_str(body).map_err(|e| {
        error!(raw = %body, "metrics response is not a JSON object");
        KeyplanError::decode(format!("metrics response is not a JSON object: {e}"), body)
    })?;

    let mut records = MetricsMap::with_capacity(entries.len());

    for (key, value) in entries {
        match value {
            Value::Object(_) => match serde_json::from_value::<MetricsRecord>(value) {
                Ok(record) => {
                    records.insert(key, record);
                }
                Err(e) => warn!(%key, error = %e, "discarding malformed metrics record"),
            },
            Value::Null => debug!(%key, "provider returned no metrics"),
            other => warn!(%key, value = %other, "discarding non-object metrics entry"),
        }
    }

    Ok(records)
}

/// Union per-batch maps into one. A key seen again later overwrites the
/// earlier record but keeps its first position.
pub fn merge_batches(batches: impl IntoIterator<Item = MetricsMap>) -> MetricsMap {
    let mut merged = MetricsMap::new();
    for batch in batches {
        merged.extend(batch);
    }
    merged
}
