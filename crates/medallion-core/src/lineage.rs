//! Provenance records for stage executions.
//!
//! A [`LineageRecord`] is written once per stage run under the `lineage`
//! tier and never rewritten. Records are keyed by stage name and a UTC
//! timestamp truncated to the second; [`lineage_blob_name`] builds that key.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Tier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    pub stage: String,
    /// ISO-8601 UTC timestamp of the emit call.
    pub timestamp: String,
    pub file_count: usize,
    pub processed_files: Vec<String>,
    pub quality_metrics: Value,
    /// Stage-specific fields (e.g. `embedding_model`) merged into the top level.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineageRecord {
    pub fn new(
        stage: &str,
        at: DateTime<Utc>,
        processed_files: Vec<String>,
        quality_metrics: Value,
        extra: Option<Map<String, Value>>,
    ) -> Self {
        let mut extra = extra.unwrap_or_default();
        // Extra fields must not shadow the core provenance fields.
        for reserved in [
            "stage",
            "timestamp",
            "file_count",
            "processed_files",
            "quality_metrics",
        ] {
            extra.remove(reserved);
        }

        Self {
            stage: stage.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
            file_count: processed_files.len(),
            processed_files,
            quality_metrics,
            extra,
        }
    }
}

/// Blob name for a lineage record: `lineage/{stage}_{YYYYMMDDTHHMMSSZ}.json`.
///
/// `sequence > 0` appends a disambiguating suffix for records emitted within
/// the same second.
pub fn lineage_blob_name(stage: &str, at: DateTime<Utc>, sequence: usize) -> String {
    let stamp = at.format("%Y%m%dT%H%M%SZ");
    let file = if sequence == 0 {
        format!("{}_{}.json", stage, stamp)
    } else {
        format!("{}_{}_{}.json", stage, stamp, sequence)
    };
    Tier::Lineage.blob_name(&file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_blob_name_second_resolution() {
        assert_eq!(
            lineage_blob_name("raw_to_bronze", at(), 0),
            "lineage/raw_to_bronze_20240309T140507Z.json"
        );
        assert_eq!(
            lineage_blob_name("raw_to_bronze", at(), 2),
            "lineage/raw_to_bronze_20240309T140507Z_2.json"
        );
    }

    #[test]
    fn test_extra_is_flattened() {
        let mut extra = Map::new();
        extra.insert("embedding_model".into(), json!("all-minilm-l6-v2"));
        extra.insert("stage".into(), json!("spoofed"));
        let record = LineageRecord::new(
            "silver_to_gold",
            at(),
            vec!["silver/a.parquet".into()],
            json!({"total_embedding_chunks": 3}),
            Some(extra),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["stage"], json!("silver_to_gold"));
        assert_eq!(value["file_count"], json!(1));
        assert_eq!(value["embedding_model"], json!("all-minilm-l6-v2"));
        assert!(value["timestamp"].as_str().unwrap().starts_with("2024-03-09T14:05:07"));

        let back: LineageRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
