//! Lineage recorder.
//!
//! Persists one [`LineageRecord`] per stage execution under
//! `lineage/{stage}_{YYYYMMDDTHHMMSSZ}.json`. Records are append-only: when a
//! record for the same stage already exists within the same second, a
//! numeric suffix is added instead of overwriting it.
//!
//! Emitting is best-effort. A failed write is logged and reported to the
//! caller as `None`; it never unwinds stage work that already completed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use medallion_core::lineage::{lineage_blob_name, LineageRecord};
use medallion_core::store::{BlobStore, CONTENT_TYPE_JSON};
use medallion_core::{PipelineError, Result};

pub struct LineageRecorder {
    store: Arc<dyn BlobStore>,
    // Serializes name selection so two emits cannot pick the same blob.
    naming: Mutex<()>,
}

impl LineageRecorder {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            naming: Mutex::new(()),
        }
    }

    /// Write a lineage record stamped with the current time.
    ///
    /// Returns the blob name on success; failures are logged.
    pub async fn emit(
        &self,
        stage: &str,
        processed_files: &[String],
        quality_metrics: Value,
        extra: Option<Map<String, Value>>,
    ) -> Option<String> {
        match self
            .emit_at(Utc::now(), stage, processed_files, quality_metrics, extra)
            .await
        {
            Ok(name) => {
                tracing::info!("Lineage for stage '{}' written to {}", stage, name);
                Some(name)
            }
            Err(e) => {
                tracing::error!("Failed to persist lineage for stage '{}': {}", stage, e);
                None
            }
        }
    }

    /// Write a lineage record stamped with `at`.
    pub async fn emit_at(
        &self,
        at: DateTime<Utc>,
        stage: &str,
        processed_files: &[String],
        quality_metrics: Value,
        extra: Option<Map<String, Value>>,
    ) -> Result<String> {
        let record = LineageRecord::new(stage, at, processed_files.to_vec(), quality_metrics, extra);
        let bytes = serde_json::to_vec_pretty(&record).map_err(|e| PipelineError::ReportPersist {
            name: stage.to_string(),
            message: e.to_string(),
        })?;

        let _guard = self.naming.lock().await;
        let name = self.free_name(stage, at).await?;
        self.store
            .put(&name, bytes, CONTENT_TYPE_JSON)
            .await
            .map_err(|e| PipelineError::ReportPersist {
                name: name.clone(),
                message: e.to_string(),
            })?;
        Ok(name)
    }

    async fn free_name(&self, stage: &str, at: DateTime<Utc>) -> Result<String> {
        let base = lineage_blob_name(stage, at, 0);
        let stem = base.trim_end_matches(".json");
        let taken = self
            .store
            .list(stem, ".json")
            .await
            .map_err(|e| PipelineError::ReportPersist {
                name: base.clone(),
                message: e.to_string(),
            })?;

        let mut sequence = 0;
        loop {
            let candidate = lineage_blob_name(stage, at, sequence);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            sequence += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use medallion_core::store::memory::InMemoryBlobStore;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
    }

    #[tokio::test]
    async fn test_emit_writes_json_record() {
        let store = Arc::new(InMemoryBlobStore::new());
        let recorder = LineageRecorder::new(store.clone());
        let files = vec!["silver/a.parquet".to_string()];

        let name = recorder
            .emit_at(at(), "bronze_to_silver", &files, json!({"avg_word_count": 2.0}), None)
            .await
            .unwrap();
        assert_eq!(name, "lineage/bronze_to_silver_20240501T123045Z.json");
        assert_eq!(store.content_type(&name).as_deref(), Some(CONTENT_TYPE_JSON));

        let record: LineageRecord = serde_json::from_slice(&store.get(&name).await.unwrap()).unwrap();
        assert_eq!(record.file_count, 1);
        assert_eq!(record.processed_files, files);
    }

    #[tokio::test]
    async fn test_same_second_never_overwrites() {
        let store = Arc::new(InMemoryBlobStore::new());
        let recorder = LineageRecorder::new(store.clone());

        let first = recorder.emit_at(at(), "silver_to_gold", &[], json!({}), None).await.unwrap();
        let second = recorder.emit_at(at(), "silver_to_gold", &[], json!({}), None).await.unwrap();
        let third = recorder.emit_at(at(), "silver_to_gold", &[], json!({}), None).await.unwrap();

        assert_eq!(first, "lineage/silver_to_gold_20240501T123045Z.json");
        assert_eq!(second, "lineage/silver_to_gold_20240501T123045Z_1.json");
        assert_eq!(third, "lineage/silver_to_gold_20240501T123045Z_2.json");
        assert_eq!(store.len(), 3);
    }

    struct FailingStore;

    #[async_trait]
    impl BlobStore for FailingStore {
        async fn list(&self, _prefix: &str, _suffix: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn get(&self, name: &str) -> Result<Vec<u8>> {
            Err(PipelineError::storage(name, "unavailable"))
        }
        async fn put(&self, name: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<()> {
            Err(PipelineError::storage(name, "unavailable"))
        }
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported_not_raised() {
        let recorder = LineageRecorder::new(Arc::new(FailingStore));
        let written = recorder.emit("raw_to_bronze", &[], json!({}), None).await;
        assert!(written.is_none());

        let err = recorder
            .emit_at(at(), "raw_to_bronze", &[], json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ReportPersist { .. }));
    }
}
