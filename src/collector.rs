//! Source collection.
//!
//! Walks every configured prefix of a bucket, fetches each candidate object,
//! adapts it with its modality's adapter, and accumulates one batch per
//! modality. Each object yields an explicit [`FileOutcome`]; a bad object is
//! recorded as skipped and never aborts the collection.
//!
//! Objects that are never candidates (and produce no outcome):
//! directory markers, zero-byte objects, and sentinel / manifest files.

use clipfuse_core::adapters;
use clipfuse_core::error::ParseError;
use clipfuse_core::fusion;
use clipfuse_core::models::{
    DetectionItem, EmbeddingItem, FusionResult, Modality, ModalityBatch, OriginalCounts,
    TranscriptItem,
};
use thiserror::Error;

use crate::config::{SourcePrefix, TriggerConfig};
use crate::storage::{ObjectMeta, ObjectStore, StorageError};

/// Why an object (or a whole prefix) contributed nothing.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("listing failed: {0}")]
    List(#[source] StorageError),

    #[error("fetch failed: {0}")]
    Fetch(#[source] StorageError),

    #[error("not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug)]
pub enum FileOutcome {
    Adapted {
        key: String,
        modality: Modality,
        items: usize,
    },
    Skipped {
        /// Object key, or the prefix itself when its listing failed.
        key: String,
        reason: SkipReason,
    },
}

/// Everything gathered from one bucket, batched per modality.
#[derive(Debug, Default)]
pub struct Collection {
    pub transcript: Vec<TranscriptItem>,
    pub embedding: Vec<EmbeddingItem>,
    pub detection: Vec<DetectionItem>,
    pub outcomes: Vec<FileOutcome>,
}

impl Collection {
    fn absorb(&mut self, batch: ModalityBatch) {
        match batch {
            ModalityBatch::Transcript(items) => self.transcript.extend(items),
            ModalityBatch::Embedding(items) => self.embedding.extend(items),
            ModalityBatch::Detection(items) => self.detection.extend(items),
        }
    }

    pub fn counts(&self) -> OriginalCounts {
        OriginalCounts {
            transcript_records: self.transcript.len(),
            embedding_records: self.embedding.len(),
            detection_records: self.detection.len(),
        }
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Skipped { key, reason } => Some((key.as_str(), reason)),
            FileOutcome::Adapted { .. } => None,
        })
    }

    pub fn adapted_files(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Adapted { .. }))
            .count()
    }

    /// Run the fusion engine over the collected batches.
    pub fn fuse(&self) -> FusionResult {
        fusion::fuse_batches(&self.embedding, &self.transcript, &self.detection)
    }
}

/// Collect every modality document under `sources` in `bucket`.
///
/// Prefixes are visited in order and objects in listing order, so batch
/// order is deterministic for a given listing snapshot.
pub async fn collect(
    store: &dyn ObjectStore,
    bucket: &str,
    sources: &[SourcePrefix],
    ignore: &TriggerConfig,
) -> Collection {
    let mut collection = Collection::default();

    for source in sources {
        let listed = match store.list(bucket, &source.prefix).await {
            Ok(listed) => listed,
            Err(e) => {
                tracing::warn!(
                    bucket,
                    prefix = %source.prefix,
                    error = %e,
                    "prefix listing failed; skipping"
                );
                collection.outcomes.push(FileOutcome::Skipped {
                    key: source.prefix.clone(),
                    reason: SkipReason::List(e),
                });
                continue;
            }
        };

        for object in listed.iter().filter(|o| is_candidate(o, ignore)) {
            match fetch_and_adapt(store, bucket, &object.key, source.modality).await {
                Ok(batch) => {
                    tracing::info!(
                        key = %object.key,
                        modality = %source.modality,
                        items = batch.len(),
                        "processed"
                    );
                    collection.outcomes.push(FileOutcome::Adapted {
                        key: object.key.clone(),
                        modality: source.modality,
                        items: batch.len(),
                    });
                    collection.absorb(batch);
                }
                Err(reason) => {
                    tracing::warn!(
                        key = %object.key,
                        modality = %source.modality,
                        error = %reason,
                        "file skipped"
                    );
                    collection.outcomes.push(FileOutcome::Skipped {
                        key: object.key.clone(),
                        reason,
                    });
                }
            }
        }
    }

    let counts = collection.counts();
    tracing::info!(
        transcript = counts.transcript_records,
        embedding = counts.embedding_records,
        detection = counts.detection_records,
        skipped = collection.skipped().count(),
        "collection complete"
    );
    collection
}

fn is_candidate(object: &ObjectMeta, ignore: &TriggerConfig) -> bool {
    if object.is_dir_marker() || object.size == 0 || ignore.is_ignored(&object.key) {
        tracing::debug!(key = %object.key, size = object.size, "not a modality document");
        return false;
    }
    true
}

/// Fetch one object, decode it as JSON and adapt it.
pub async fn fetch_and_adapt(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    modality: Modality,
) -> Result<ModalityBatch, SkipReason> {
    let body = store.get(bucket, key).await.map_err(SkipReason::Fetch)?;
    let doc: serde_json::Value = serde_json::from_slice(&body).map_err(SkipReason::Decode)?;
    Ok(adapters::adapt(modality, &doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::memory::MemoryStore;
    use async_trait::async_trait;

    const TRANSCRIPT: &str = r#"{"results": {"items": [
        {"type": "pronunciation", "start_time": "1.0", "end_time": "2.0", "alternatives": [{"content": "hello"}]},
        {"type": "punctuation", "alternatives": [{"content": "."}]}
    ]}}"#;

    fn sources() -> Vec<SourcePrefix> {
        Config::default().source_prefixes().unwrap()
    }

    #[tokio::test]
    async fn test_collects_all_modalities_and_aliases() {
        let store = MemoryStore::new();
        store.insert("media", "transcribe/a.json", TRANSCRIPT);
        store.insert(
            "media",
            "twelvelabs/seg.json",
            r#"{"embedding": [1, 2], "startSec": 0, "endSec": 5}"#,
        );
        store.insert(
            "media",
            "marengo_data/seg.json",
            r#"[{"embedding": [3], "startSec": 5, "endSec": 9}]"#,
        );
        store.insert(
            "media",
            "yolo/f.json",
            r#"{"detections": [{"timestamp_seconds": 1, "class_name": "ball"}]}"#,
        );
        store.insert(
            "media",
            "yolo_opencv/g.json",
            r#"{"frames": [{"timestamp_seconds": 2, "detections": [{"class_name": "net"}]}]}"#,
        );

        let c = collect(&store, "media", &sources(), &TriggerConfig::default()).await;
        assert_eq!(c.transcript.len(), 1);
        assert_eq!(c.embedding.len(), 2);
        assert_eq!(c.detection.len(), 2);
        assert_eq!(c.adapted_files(), 5);
        assert_eq!(c.skipped().count(), 0);
        // Prefix order decides batch order.
        assert_eq!(c.embedding[0].vector, vec![1.0, 2.0]);
        assert_eq!(c.embedding[1].vector, vec![3.0]);
    }

    #[tokio::test]
    async fn test_non_candidates_produce_no_outcome() {
        let store = MemoryStore::new();
        store.insert("media", "transcribe/", "");
        store.insert("media", "transcribe/empty.json", "");
        store.insert("media", "transcribe/manifest.json", "{\"jobs\": []}");
        store.insert("media", "transcribe/.write_access_check_file.temp", "x");
        store.insert("media", "transcribe/real.json", TRANSCRIPT);

        let c = collect(&store, "media", &sources(), &TriggerConfig::default()).await;
        assert_eq!(c.outcomes.len(), 1);
        assert_eq!(c.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_files_skipped_without_aborting() {
        let store = MemoryStore::new();
        store.insert("media", "transcribe/a-broken.json", "{not json");
        store.insert("media", "transcribe/b-wrong-shape.json", r#"{"detections": []}"#);
        store.insert("media", "transcribe/c-good.json", TRANSCRIPT);
        store.insert("media", "yolo/unknown.json", r#"{"objects": []}"#);

        let c = collect(&store, "media", &sources(), &TriggerConfig::default()).await;
        assert_eq!(c.transcript.len(), 1);
        assert!(c.detection.is_empty());

        let skipped: Vec<(&str, &SkipReason)> = c.skipped().collect();
        assert_eq!(skipped.len(), 3);
        assert!(matches!(skipped[0], ("transcribe/a-broken.json", SkipReason::Decode(_))));
        assert!(matches!(skipped[1], ("transcribe/b-wrong-shape.json", SkipReason::Parse(_))));
        assert!(matches!(skipped[2], ("yolo/unknown.json", SkipReason::Parse(_))));
    }

    /// Lists objects it cannot serve, and fails one whole prefix.
    struct FlakyStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        fn backend(&self) -> &str {
            "flaky"
        }

        async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
            if prefix == "yolo/" {
                return Err(StorageError::Http {
                    operation: "ListObjectsV2",
                    status: 503,
                    message: "slow down".to_string(),
                });
            }
            self.inner.list(bucket, prefix).await
        }

        async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StorageError> {
            self.inner.head(bucket, key).await
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
            if key.contains("gone") {
                return Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            self.inner.get(bucket, key).await
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<(), StorageError> {
            self.inner.put(bucket, key, body, content_type).await
        }
    }

    #[tokio::test]
    async fn test_storage_failures_are_skips() {
        let inner = MemoryStore::new();
        inner.insert("media", "transcribe/gone.json", TRANSCRIPT);
        inner.insert("media", "transcribe/ok.json", TRANSCRIPT);
        inner.insert("media", "yolo/f.json", r#"{"detections": []}"#);
        inner.insert(
            "media",
            "yolo_opencv/g.json",
            r#"{"detections": [{"timestamp_seconds": 1, "class_name": "cup"}]}"#,
        );
        let store = FlakyStore { inner };

        let c = collect(&store, "media", &sources(), &TriggerConfig::default()).await;
        assert_eq!(c.transcript.len(), 1);
        assert_eq!(c.detection.len(), 1);

        let skipped: Vec<(&str, &SkipReason)> = c.skipped().collect();
        assert_eq!(skipped.len(), 2);
        assert!(matches!(skipped[0], ("transcribe/gone.json", SkipReason::Fetch(_))));
        assert!(matches!(skipped[1], ("yolo/", SkipReason::List(_))));
    }

    #[tokio::test]
    async fn test_other_buckets_not_visited() {
        let store = MemoryStore::new();
        store.insert("elsewhere", "transcribe/a.json", TRANSCRIPT);
        let c = collect(&store, "media", &sources(), &TriggerConfig::default()).await;
        assert!(c.outcomes.is_empty());
        assert_eq!(c.counts(), OriginalCounts::default());
        assert!(c.fuse().clips.is_empty());
    }
}
