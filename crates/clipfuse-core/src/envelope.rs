//! The consolidated output envelope.
//!
//! ```json
//! {
//!   "processed_at": "2026-10-19T08:30:12.345Z",
//!   "total_clips": 1,
//!   "original_counts": {
//!     "transcript_records": 2,
//!     "embedding_records": 1,
//!     "detection_records": 0
//!   },
//!   "matched_clips": [
//!     {"startSec": 0.0, "endSec": 5.0, "embedding": [1.0, 2.0],
//!      "transcript": "hello", "detectedObjects": []}
//!   ]
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::models::{ConsolidatedClip, FusionResult, OriginalCounts};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(serialize_with = "iso_millis")]
    pub processed_at: DateTime<Utc>,
    pub total_clips: usize,
    pub original_counts: OriginalCounts,
    pub matched_clips: Vec<ConsolidatedClip>,
}

impl Envelope {
    pub fn new(result: FusionResult, processed_at: DateTime<Utc>) -> Self {
        Self {
            processed_at,
            total_clips: result.clips.len(),
            original_counts: result.counts,
            matched_clips: result.clips,
        }
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Object key for this envelope under `prefix`.
    ///
    /// The processing time orders artifacts; `run_id` keeps two runs in the
    /// same millisecond apart.
    pub fn artifact_key(&self, prefix: &str, run_id: &Uuid) -> String {
        format!(
            "{}integrated_data_{}_{}.json",
            prefix,
            self.processed_at.format("%Y%m%d_%H%M%S_%3f"),
            run_id.simple()
        )
    }
}

fn iso_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConsolidatedClip, TimeInterval};
    use chrono::TimeZone;

    fn sample() -> Envelope {
        let clip = ConsolidatedClip {
            start_sec: 0.0,
            end_sec: 5.0,
            embedding: vec![1.0, 2.0],
            transcript: "hello".to_string(),
            detected_objects: Default::default(),
        };
        let result = FusionResult {
            clips: vec![clip],
            counts: OriginalCounts {
                transcript_records: 2,
                embedding_records: 1,
                detection_records: 0,
            },
        };
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 12).unwrap()
            + chrono::Duration::milliseconds(345);
        Envelope::new(result, at)
    }

    #[test]
    fn test_envelope_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["processed_at"], "2026-10-19T08:30:12.345Z");
        assert_eq!(value["total_clips"], 1);
        assert_eq!(value["original_counts"]["transcript_records"], 2);
        assert_eq!(value["original_counts"]["embedding_records"], 1);
        assert_eq!(value["original_counts"]["detection_records"], 0);
        assert_eq!(value["matched_clips"][0]["transcript"], "hello");
        assert_eq!(
            value["matched_clips"][0]["detectedObjects"],
            serde_json::json!([])
        );
    }

    #[test]
    fn test_artifact_key_includes_timestamp_and_run_id() {
        let run_id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            sample().artifact_key("combined_data/", &run_id),
            "combined_data/integrated_data_20261019_083012_345_67e5504410b1426f9247bb680e5fe0c8.json"
        );
    }

    #[test]
    fn test_same_instant_different_runs_get_distinct_keys() {
        let env = sample();
        let a = env.artifact_key("combined_data/", &Uuid::new_v4());
        let b = env.artifact_key("combined_data/", &Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn test_pretty_json_is_indented() {
        let text = sample().to_json_pretty().unwrap();
        assert!(text.starts_with("{\n  \"processed_at\""));
    }

    #[test]
    fn test_embedding_values_survive_into_artifact() {
        let doc = serde_json::json!({
            "embedding": [0.0123456789012345, 1e39, -0.987654321],
            "startSec": 0,
            "endSec": 5
        });
        let segments = crate::adapters::embedding::parse_embedding(&doc).unwrap();
        let result = crate::fusion::fuse_batches(&segments, &[], &[]);
        let env = Envelope::new(result, sample().processed_at);

        let value: serde_json::Value =
            serde_json::from_str(&env.to_json_pretty().unwrap()).unwrap();
        assert_eq!(
            value["matched_clips"][0]["embedding"],
            serde_json::json!([0.0123456789012345, 1e39, -0.987654321])
        );
    }

    #[test]
    fn test_total_matches_clips() {
        let env = sample();
        assert_eq!(env.total_clips, env.matched_clips.len());
        assert_eq!(env.matched_clips[0].interval(), TimeInterval::new(0.0, 5.0));
    }
}
